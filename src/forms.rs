use crate::api::{ApiClient, ApiError, Category, NewProduct, Product};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use url::Url;

pub const SELECT_CATEGORY_LABEL: &str = "Select a category";
pub const ALL_CATEGORIES_LABEL: &str = "All categories";
const LOAD_ERROR_LABEL: &str = "Unable to load categories";
const CONNECT_ERROR_LABEL: &str = "Connection error - reload the page";

/// Which sentinel entry heads the category choice list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceContext {
    Create,
    Filter,
}

#[derive(Debug, Clone)]
pub struct CategoryChoice {
    pub id: String,
    pub label: String,
    pub selected: bool,
}

impl CategoryChoice {
    pub fn sentinel(label: &str) -> Self {
        Self {
            id: String::new(),
            label: label.to_string(),
            selected: false,
        }
    }
}

/// Convert a category fetch outcome into `<select>` options. A failed
/// fetch degrades to a single sentinel whose label tells connection
/// failures apart from everything else; forms still render.
pub fn category_choices(
    result: Result<Vec<Category>, ApiError>,
    context: ChoiceContext,
) -> Vec<CategoryChoice> {
    match result {
        Ok(categories) => {
            let sentinel = match context {
                ChoiceContext::Create => SELECT_CATEGORY_LABEL,
                ChoiceContext::Filter => ALL_CATEGORIES_LABEL,
            };
            let mut choices = Vec::with_capacity(categories.len() + 1);
            choices.push(CategoryChoice::sentinel(sentinel));
            choices.extend(categories.into_iter().map(|c| CategoryChoice {
                id: c.id.to_string(),
                label: c.name,
                selected: false,
            }));
            choices
        }
        Err(err) => {
            log::warn!("Unable to load categories: {err}");
            let label = if err.is_connect() {
                CONNECT_ERROR_LABEL
            } else {
                LOAD_ERROR_LABEL
            };
            vec![CategoryChoice::sentinel(label)]
        }
    }
}

pub async fn load_category_choices(api: &ApiClient, context: ChoiceContext) -> Vec<CategoryChoice> {
    category_choices(api.list_categories().await, context)
}

/// Raw submitted product fields, named after the inputs they come from.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFormData {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "categoryId")]
    pub category_id: String,
    #[serde(default)]
    pub image_url_1: String,
    #[serde(default)]
    pub image_url_2: String,
    #[serde(default)]
    pub image_url_3: String,
}

#[derive(Debug, Clone)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// The create-product form. Built in two steps: the static shape
/// first, then the fetched category choices injected with
/// [`ProductForm::with_choices`].
#[derive(Debug, Default)]
pub struct ProductForm {
    pub data: ProductFormData,
    pub choices: Vec<CategoryChoice>,
    pub errors: Vec<FieldError>,
}

impl ProductForm {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn bind(data: ProductFormData) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    /// Prefill from an existing product for the edit page.
    pub fn prefill(product: &Product) -> Self {
        Self::bind(ProductFormData {
            title: product.title.clone(),
            price: product.price.to_string(),
            description: product.description.clone(),
            category_id: product
                .category
                .as_ref()
                .map(|c| c.id.to_string())
                .unwrap_or_default(),
            image_url_1: product.images.first().cloned().unwrap_or_default(),
            ..ProductFormData::default()
        })
    }

    pub fn with_choices(mut self, choices: Vec<CategoryChoice>) -> Self {
        let current = self.data.category_id.trim();
        self.choices = choices;
        for choice in &mut self.choices {
            choice.selected = !choice.id.is_empty() && choice.id == current;
        }
        self
    }

    /// Runs every field validator independently, then the whole-form
    /// pass. Returns whether the form is valid.
    pub fn validate(&mut self) -> bool {
        self.errors.clear();
        self.validate_title();
        self.validate_price();
        self.validate_description();
        self.validate_category();
        self.validate_images();
        self.validate_form();
        self.errors.is_empty()
    }

    fn validate_title(&mut self) {
        if self.data.title.trim().is_empty() {
            self.push_error("title", "Product title is required");
        }
    }

    fn validate_price(&mut self) {
        match parse_price(&self.data.price) {
            Ok(price) if price > Decimal::ZERO => {}
            Ok(_) => self.push_error("price", "Price must be greater than 0"),
            Err(_) => self.push_error("price", "Enter a valid price"),
        }
    }

    fn validate_description(&mut self) {
        if self.data.description.trim().is_empty() {
            self.push_error("description", "Product description is required");
        }
    }

    fn validate_category(&mut self) {
        let category_id = self.data.category_id.trim();
        if category_id.is_empty() {
            self.push_error("categoryId", "Select a category");
        } else if category_id.parse::<i64>().is_err() {
            self.push_error("categoryId", "Invalid category");
        }
    }

    fn validate_images(&mut self) {
        let first = self.data.image_url_1.trim();
        if first.is_empty() {
            self.push_error("image_url_1", "An image URL is required");
        } else if Url::parse(first).is_err() {
            self.push_error("image_url_1", "Enter a valid URL");
        }
        for (field, value) in [
            ("image_url_2", &self.data.image_url_2),
            ("image_url_3", &self.data.image_url_3),
        ] {
            let value = value.trim();
            if !value.is_empty() && Url::parse(value).is_err() {
                self.push_error(field, "Enter a valid URL");
            }
        }
    }

    // Reserved for cross-field rules; none are enforced yet.
    fn validate_form(&mut self) {}

    fn push_error(&mut self, field: &'static str, message: &str) {
        self.errors.push(FieldError {
            field,
            message: message.to_string(),
        });
    }

    pub fn errors_for(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The normalized API payload, or `None` when the form does not
    /// validate. Callers must not submit on `None`. The images list is
    /// never empty for a valid form and keeps the input order,
    /// skipping blank optional URLs.
    pub fn product_data(&mut self) -> Option<NewProduct> {
        if !self.validate() {
            return None;
        }
        let price = parse_price(&self.data.price).ok()?.to_f64()?;
        let category_id = self.data.category_id.trim().parse().ok()?;
        let images = [
            &self.data.image_url_1,
            &self.data.image_url_2,
            &self.data.image_url_3,
        ]
        .into_iter()
        .map(|url| url.trim())
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect();
        Some(NewProduct {
            title: self.data.title.trim().to_string(),
            price,
            description: self.data.description.trim().to_string(),
            category_id,
            images,
        })
    }
}

fn parse_price(raw: &str) -> Result<Decimal, rust_decimal::Error> {
    Decimal::from_str_exact(raw.trim())
}

/// The list view's search/filter form. Blank fields mean "no filter";
/// nothing else is validated here.
#[derive(Debug, Default)]
pub struct SearchForm {
    pub search: String,
    pub category: String,
    pub choices: Vec<CategoryChoice>,
}

impl SearchForm {
    pub fn new(search: Option<String>, category: Option<String>) -> Self {
        Self {
            search: search.unwrap_or_default().trim().to_string(),
            category: category.unwrap_or_default().trim().to_string(),
            choices: Vec::new(),
        }
    }

    pub fn with_choices(mut self, choices: Vec<CategoryChoice>) -> Self {
        self.choices = choices;
        for choice in &mut self.choices {
            choice.selected = !choice.id.is_empty() && choice.id == self.category;
        }
        self
    }

    pub fn search_filter(&self) -> Option<&str> {
        Some(self.search.as_str()).filter(|s| !s.is_empty())
    }

    pub fn category_filter(&self) -> Option<&str> {
        Some(self.category.as_str()).filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i64, name: &str) -> Category {
        Category {
            id,
            name: name.to_string(),
        }
    }

    fn valid_data() -> ProductFormData {
        ProductFormData {
            title: "iPhone 14 Pro Max".to_string(),
            price: "1199.99".to_string(),
            description: "Flagship phone".to_string(),
            category_id: "2".to_string(),
            image_url_1: "https://example.com/1.jpg".to_string(),
            image_url_2: "https://example.com/2.jpg".to_string(),
            image_url_3: String::new(),
        }
    }

    #[test]
    fn valid_form_yields_payload() {
        let mut form = ProductForm::bind(valid_data());
        let data = form.product_data().expect("form should be valid");
        assert_eq!(data.title, "iPhone 14 Pro Max");
        assert_eq!(data.price, 1199.99);
        assert_eq!(data.category_id, 2);
        assert_eq!(
            data.images,
            vec![
                "https://example.com/1.jpg".to_string(),
                "https://example.com/2.jpg".to_string()
            ]
        );
        assert_eq!(data.images[0], form.data.image_url_1);
    }

    #[test]
    fn zero_price_is_rejected_without_payload() {
        let mut form = ProductForm::bind(ProductFormData {
            price: "0".to_string(),
            ..valid_data()
        });
        assert!(form.product_data().is_none());
        assert_eq!(form.errors_for("price"), vec!["Price must be greater than 0"]);
    }

    #[test]
    fn negative_and_garbage_prices_are_rejected() {
        let mut form = ProductForm::bind(ProductFormData {
            price: "-5".to_string(),
            ..valid_data()
        });
        assert!(!form.validate());
        assert_eq!(form.errors_for("price"), vec!["Price must be greater than 0"]);

        let mut form = ProductForm::bind(ProductFormData {
            price: "cheap".to_string(),
            ..valid_data()
        });
        assert!(!form.validate());
        assert_eq!(form.errors_for("price"), vec!["Enter a valid price"]);
    }

    #[test]
    fn whitespace_only_text_fields_are_rejected() {
        let mut form = ProductForm::bind(ProductFormData {
            title: "   ".to_string(),
            description: "\t".to_string(),
            ..valid_data()
        });
        assert!(!form.validate());
        assert!(!form.errors_for("title").is_empty());
        assert!(!form.errors_for("description").is_empty());
    }

    #[test]
    fn category_must_resolve_to_an_integer() {
        let mut form = ProductForm::bind(ProductFormData {
            category_id: String::new(),
            ..valid_data()
        });
        assert!(!form.validate());
        assert_eq!(form.errors_for("categoryId"), vec!["Select a category"]);

        let mut form = ProductForm::bind(ProductFormData {
            category_id: "electronics".to_string(),
            ..valid_data()
        });
        assert!(!form.validate());
        assert_eq!(form.errors_for("categoryId"), vec!["Invalid category"]);
    }

    #[test]
    fn first_image_is_mandatory_and_checked() {
        let mut form = ProductForm::bind(ProductFormData {
            image_url_1: String::new(),
            ..valid_data()
        });
        assert!(!form.validate());
        assert_eq!(form.errors_for("image_url_1"), vec!["An image URL is required"]);

        let mut form = ProductForm::bind(ProductFormData {
            image_url_1: "not a url".to_string(),
            ..valid_data()
        });
        assert!(!form.validate());
        assert_eq!(form.errors_for("image_url_1"), vec!["Enter a valid URL"]);
    }

    #[test]
    fn optional_images_are_checked_only_when_present() {
        let mut form = ProductForm::bind(ProductFormData {
            image_url_2: String::new(),
            image_url_3: String::new(),
            ..valid_data()
        });
        assert!(form.validate());

        let mut form = ProductForm::bind(ProductFormData {
            image_url_3: "broken".to_string(),
            ..valid_data()
        });
        assert!(!form.validate());
        assert_eq!(form.errors_for("image_url_3"), vec!["Enter a valid URL"]);
    }

    #[test]
    fn image_order_is_preserved_with_gaps_closed() {
        let mut form = ProductForm::bind(ProductFormData {
            image_url_2: String::new(),
            image_url_3: "https://example.com/3.jpg".to_string(),
            ..valid_data()
        });
        let data = form.product_data().expect("form should be valid");
        assert_eq!(
            data.images,
            vec![
                "https://example.com/1.jpg".to_string(),
                "https://example.com/3.jpg".to_string()
            ]
        );
    }

    #[test]
    fn field_validators_do_not_short_circuit() {
        let mut form = ProductForm::bind(ProductFormData::default());
        assert!(!form.validate());
        for field in ["title", "price", "description", "categoryId", "image_url_1"] {
            assert!(!form.errors_for(field).is_empty(), "missing error for {field}");
        }
    }

    #[test]
    fn choices_carry_the_context_sentinel() {
        let cats = vec![category(1, "Clothes"), category(2, "Electronics")];
        let choices = category_choices(Ok(cats.clone()), ChoiceContext::Create);
        assert_eq!(choices.len(), 3);
        assert_eq!(choices[0].id, "");
        assert_eq!(choices[0].label, "Select a category");
        assert_eq!(choices[1].label, "Clothes");
        assert_eq!(choices[2].id, "2");

        let choices = category_choices(Ok(cats), ChoiceContext::Filter);
        assert_eq!(choices[0].label, "All categories");
    }

    #[test]
    fn failed_category_load_degrades_to_one_sentinel() {
        let decode_err = serde_json::from_str::<Vec<i32>>("oops").expect_err("must fail");
        let choices = category_choices(Err(ApiError::Decode(decode_err)), ChoiceContext::Create);
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].id, "");
        assert_eq!(choices[0].label, "Unable to load categories");

        let status_err = ApiError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            message: None,
        };
        let choices = category_choices(Err(status_err), ChoiceContext::Filter);
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].label, "Unable to load categories");
    }

    #[test]
    fn prefill_copies_the_current_values() {
        let product = Product {
            id: 7,
            title: "Mouse".to_string(),
            price: 25.5,
            description: "Wireless".to_string(),
            images: vec![
                "https://example.com/a.jpg".to_string(),
                "https://example.com/b.jpg".to_string(),
            ],
            category: Some(category(3, "Electronics")),
        };
        let form = ProductForm::prefill(&product);
        assert_eq!(form.data.title, "Mouse");
        assert_eq!(form.data.price, "25.5");
        assert_eq!(form.data.category_id, "3");
        assert_eq!(form.data.image_url_1, "https://example.com/a.jpg");
        assert_eq!(form.data.image_url_2, "");
    }

    #[test]
    fn selected_choice_follows_the_bound_value() {
        let choices = category_choices(
            Ok(vec![category(1, "Clothes"), category(2, "Electronics")]),
            ChoiceContext::Create,
        );
        let form = ProductForm::bind(ProductFormData {
            category_id: "2".to_string(),
            ..valid_data()
        })
        .with_choices(choices);
        let selected: Vec<&str> = form
            .choices
            .iter()
            .filter(|c| c.selected)
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(selected, vec!["2"]);
    }

    #[test]
    fn search_form_treats_blank_as_no_filter() {
        let form = SearchForm::new(Some("  ".to_string()), None);
        assert_eq!(form.search_filter(), None);
        assert_eq!(form.category_filter(), None);

        let form = SearchForm::new(Some(" phone ".to_string()), Some("1".to_string()));
        assert_eq!(form.search_filter(), Some("phone"));
        assert_eq!(form.category_filter(), Some("1"));
    }
}
