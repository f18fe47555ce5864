use crate::api::{ApiClient, ApiError, Product};
use crate::control::{
    push_flash, render_template, see_other, take_flash, Flash, FlashLevel, Identity, Response,
};
use crate::forms::{
    category_choices, load_category_choices, CategoryChoice, ChoiceContext, ProductForm,
    ProductFormData, SearchForm, ALL_CATEGORIES_LABEL,
};
use crate::page::{self, PageView};
use actix_session::Session;
use actix_web::web::{Data, Form, Path, Query};
use actix_web::{get, post};
use askama::Template;
use log_error::LogError;
use serde::Deserialize;
use url::form_urlencoded;

pub struct Stats {
    pub total_products: usize,
    pub total_categories: usize,
    pub current_page: usize,
    pub total_pages: usize,
}

#[derive(Template)]
#[template(path = "product_list.html")]
pub struct ProductListPage {
    user: Option<String>,
    flash: Vec<Flash>,
    form: SearchForm,
    page: PageView<Product>,
    stats: Stats,
    page_query: String,
    api_status: &'static str,
    error_message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    #[serde(default, deserialize_with = "crate::empty_string_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "crate::empty_string_as_none")]
    pub category: Option<String>,
}

#[get("/products")]
pub async fn list(
    user: Option<Identity>,
    session: Session,
    api: Data<ApiClient>,
    Query(query): Query<ListQuery>,
) -> Response {
    let user = user.map(|u| u.login);
    let form = SearchForm::new(query.search, query.category);
    let page_number = page::parse_page(query.page.as_deref());
    let page_query = preserved_query(&form);

    match api
        .list_products(form.search_filter(), form.category_filter())
        .await
    {
        Ok(products) => {
            // A failed category fetch degrades the filter and the
            // stats, never the whole page.
            let categories = api.list_categories().await;
            let total_categories = categories.as_ref().map(|c| c.len()).unwrap_or(0);
            let form = form.with_choices(category_choices(categories, ChoiceContext::Filter));
            let page = PageView::paginate(products, page_number, page::PAGE_SIZE);
            let stats = Stats {
                total_products: page.total_items,
                total_categories,
                current_page: page.page,
                total_pages: page.total_pages,
            };
            render_template(ProductListPage {
                user,
                flash: take_flash(&session),
                form,
                page,
                stats,
                page_query,
                api_status: "success",
                error_message: String::new(),
            })
        }
        Err(err) => {
            log::warn!("Unable to fetch products: {err}");
            let error_message = err.to_string();
            push_flash(&session, FlashLevel::Error, error_message.clone());
            let form = form.with_choices(vec![CategoryChoice::sentinel(ALL_CATEGORIES_LABEL)]);
            let page = PageView::paginate(Vec::new(), 1, page::PAGE_SIZE);
            let stats = Stats {
                total_products: 0,
                total_categories: 0,
                current_page: page.page,
                total_pages: page.total_pages,
            };
            render_template(ProductListPage {
                user,
                flash: take_flash(&session),
                form,
                page,
                stats,
                page_query,
                api_status: "error",
                error_message,
            })
        }
    }
}

#[derive(Template)]
#[template(path = "product_detail.html")]
pub struct ProductDetailPage {
    user: Option<String>,
    flash: Vec<Flash>,
    product: Option<Product>,
}

#[get("/products/{id:\\d+}")]
pub async fn detail(
    user: Option<Identity>,
    session: Session,
    api: Data<ApiClient>,
    id: Path<i64>,
) -> Response {
    let user = user.map(|u| u.login);
    let product = match api.get_product(*id).await {
        Ok(product) => Some(product),
        Err(err) => {
            log::warn!("Unable to fetch product {}: {err}", *id);
            let text = match &err {
                ApiError::Status { .. } => "Product not found".to_string(),
                _ => format!("Error fetching product: {err}"),
            };
            push_flash(&session, FlashLevel::Error, text);
            None
        }
    };
    render_template(ProductDetailPage {
        user,
        flash: take_flash(&session),
        product,
    })
}

#[derive(Template)]
#[template(path = "add_product.html")]
pub struct AddProductPage {
    user: Option<String>,
    flash: Vec<Flash>,
    form: ProductForm,
}

#[get("/products/add")]
pub async fn add_page(user: Identity, session: Session, api: Data<ApiClient>) -> Response {
    let choices = load_category_choices(&api, ChoiceContext::Create).await;
    render_template(AddProductPage {
        user: Some(user.login),
        flash: take_flash(&session),
        form: ProductForm::empty().with_choices(choices),
    })
}

#[post("/products/add")]
pub async fn add_submit(
    user: Identity,
    session: Session,
    api: Data<ApiClient>,
    Form(data): Form<ProductFormData>,
) -> Response {
    let choices = load_category_choices(&api, ChoiceContext::Create).await;
    let mut form = ProductForm::bind(data).with_choices(choices.clone());
    match form.product_data() {
        Some(payload) => match api.create_product(&payload).await {
            Ok(created) => {
                push_flash(
                    &session,
                    FlashLevel::Success,
                    format!("Product \"{}\" added successfully", created.title),
                );
                // Fresh form for the next entry.
                form = ProductForm::empty().with_choices(choices);
            }
            Err(ApiError::Status { status, message }) => {
                let message =
                    message.unwrap_or_else(|| format!("Server error {}", status.as_u16()));
                push_flash(
                    &session,
                    FlashLevel::Error,
                    format!("Could not create the product: {message}"),
                );
            }
            Err(err) if err.is_connect() => {
                push_flash(&session, FlashLevel::Error, err.to_string());
            }
            Err(err) => {
                push_flash(&session, FlashLevel::Error, format!("Unexpected error: {err}"));
            }
        },
        None => {
            push_flash(
                &session,
                FlashLevel::Error,
                "Please correct the errors in the form",
            );
        }
    }
    render_template(AddProductPage {
        user: Some(user.login),
        flash: take_flash(&session),
        form,
    })
}

#[derive(Template)]
#[template(path = "update_product.html")]
pub struct UpdateProductPage {
    user: Option<String>,
    flash: Vec<Flash>,
    form: ProductForm,
    product_id: i64,
}

#[get("/products/update/{id:\\d+}")]
pub async fn update_page(
    user: Identity,
    session: Session,
    api: Data<ApiClient>,
    id: Path<i64>,
) -> Response {
    let id = id.into_inner();
    match api.get_product(id).await {
        Ok(product) => {
            let choices = load_category_choices(&api, ChoiceContext::Create).await;
            render_template(UpdateProductPage {
                user: Some(user.login),
                flash: take_flash(&session),
                form: ProductForm::prefill(&product).with_choices(choices),
                product_id: id,
            })
        }
        Err(err) => {
            log::warn!("Unable to fetch product {id} for editing: {err}");
            let text = match &err {
                ApiError::Status { .. } => "Product not found".to_string(),
                _ => err.to_string(),
            };
            push_flash(&session, FlashLevel::Error, text);
            Ok(see_other("/products"))
        }
    }
}

#[post("/products/update/{id:\\d+}")]
pub async fn update_submit(
    _user: Identity,
    session: Session,
    api: Data<ApiClient>,
    id: Path<i64>,
    Form(data): Form<ProductFormData>,
) -> Response {
    let id = id.into_inner();
    let payload = raw_update_payload(&data);
    match api.update_product(id, &payload).await {
        Ok(updated) => {
            push_flash(
                &session,
                FlashLevel::Success,
                format!("Product \"{}\" updated successfully", updated.title),
            );
        }
        Err(err) => {
            log::warn!("Unable to update product {id}: {err}");
            push_flash(&session, FlashLevel::Error, "Could not update the product");
        }
    }
    Ok(see_other("/products"))
}

// The update path forwards the submitted fields as-is; values the
// upstream cannot accept come back as a rejected request.
fn raw_update_payload(data: &ProductFormData) -> serde_json::Value {
    let price = data
        .price
        .trim()
        .parse::<f64>()
        .map(serde_json::Value::from)
        .unwrap_or_else(|_| serde_json::Value::from(data.price.clone()));
    let category_id = data
        .category_id
        .trim()
        .parse::<i64>()
        .map(serde_json::Value::from)
        .unwrap_or_else(|_| serde_json::Value::from(data.category_id.clone()));
    let images: Vec<&str> = [
        &data.image_url_1,
        &data.image_url_2,
        &data.image_url_3,
    ]
    .into_iter()
    .map(|url| url.trim())
    .filter(|url| !url.is_empty())
    .collect();
    serde_json::json!({
        "title": data.title,
        "price": price,
        "description": data.description,
        "categoryId": category_id,
        "images": images,
    })
}

#[derive(Template)]
#[template(path = "delete_product.html")]
pub struct DeleteProductPage {
    user: Option<String>,
    flash: Vec<Flash>,
    product: Option<Product>,
    product_id: i64,
}

#[get("/products/delete/{id:\\d+}")]
pub async fn delete_page(
    user: Identity,
    session: Session,
    api: Data<ApiClient>,
    id: Path<i64>,
) -> Response {
    let id = id.into_inner();
    // A failed lookup still shows the confirmation, with the product
    // unknown.
    let product = api
        .get_product(id)
        .await
        .log_error("Unable to fetch product for delete confirmation");
    render_template(DeleteProductPage {
        user: Some(user.login),
        flash: take_flash(&session),
        product,
        product_id: id,
    })
}

#[post("/products/delete/{id:\\d+}")]
pub async fn delete_submit(
    _user: Identity,
    session: Session,
    api: Data<ApiClient>,
    id: Path<i64>,
) -> Response {
    let id = id.into_inner();
    let title = api
        .get_product(id)
        .await
        .log_error("Unable to fetch product before deletion")
        .map(|p| p.title);
    match api.delete_product(id).await {
        Ok(()) => {
            let name = title
                .map(|t| format!("\"{t}\""))
                .unwrap_or_else(|| format!("#{id}"));
            push_flash(
                &session,
                FlashLevel::Success,
                format!("Product {name} deleted"),
            );
        }
        Err(ApiError::Status { status, message }) => {
            let message = message.unwrap_or_else(|| format!("Server error {}", status.as_u16()));
            push_flash(
                &session,
                FlashLevel::Error,
                format!("Could not delete the product: {message}"),
            );
        }
        Err(err) => {
            log::warn!("Unable to delete product {id}: {err}");
            push_flash(
                &session,
                FlashLevel::Error,
                format!("Could not delete the product: {err}"),
            );
        }
    }
    Ok(see_other("/products"))
}

fn preserved_query(form: &SearchForm) -> String {
    let mut qs = form_urlencoded::Serializer::new(String::new());
    if !form.search.is_empty() {
        qs.append_pair("search", &form.search);
    }
    if !form.category.is_empty() {
        qs.append_pair("category", &form.category);
    }
    let qs = qs.finish();
    if qs.is_empty() {
        qs
    } else {
        format!("{qs}&")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_payload_forwards_fields_verbatim() {
        let payload = raw_update_payload(&ProductFormData {
            title: "Mouse".to_string(),
            price: "25.50".to_string(),
            description: "Wireless".to_string(),
            category_id: "3".to_string(),
            image_url_1: "https://example.com/a.jpg".to_string(),
            image_url_2: String::new(),
            image_url_3: "https://example.com/c.jpg".to_string(),
        });
        assert_eq!(payload["title"], "Mouse");
        assert_eq!(payload["price"], 25.5);
        assert_eq!(payload["categoryId"], 3);
        assert_eq!(
            payload["images"],
            serde_json::json!(["https://example.com/a.jpg", "https://example.com/c.jpg"])
        );
    }

    #[test]
    fn raw_payload_keeps_unparseable_values_as_text() {
        let payload = raw_update_payload(&ProductFormData {
            price: "lots".to_string(),
            category_id: "none".to_string(),
            ..ProductFormData::default()
        });
        assert_eq!(payload["price"], "lots");
        assert_eq!(payload["categoryId"], "none");
        assert_eq!(payload["images"], serde_json::json!([]));
    }

    #[test]
    fn pagination_links_keep_the_active_filters() {
        let form = SearchForm::new(Some("phone case".to_string()), Some("1".to_string()));
        assert_eq!(preserved_query(&form), "search=phone+case&category=1&");
        assert_eq!(preserved_query(&SearchForm::default()), "");
    }
}
