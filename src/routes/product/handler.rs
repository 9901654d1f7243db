use std::collections::HashMap;

use axum::{
    extract::{Extension, Json, Multipart, Path, Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    common::{ApiResponse, MAX_PAGE_SIZE, Pagination, resolve_page},
    error::{ApiResult, AppError},
    middleware::Identity,
    routes::menu::model::{Category, MainMenu, Subcategory, lineage_matches, resolve_by_names},
    routes::offer::model::{
        BEST_SELLING, DAILY_OFFER, FLAGGED_OFFER_DAYS, Offer, OfferProduct, merge_products,
    },
    utils::{error_codes, multipart::FormData, success_to_api_response, success_with_message},
};

use super::model::{
    BulkProduct, DuplicateCandidate, DuplicateReport, ImportOutcome, MenuProducts, NewProduct,
    Product, ProductDetail, ProductFacets, ProductFilter, ProductInput, ProductPage, ProductQuery,
    ProductUpdate, ProductView, bucket_spec_values, check_prices, group_by_menu,
    spec_value_groups, views,
};

const IMAGE_FOLDER: &str = "products";
const DEFAULT_PAGE_SIZE: i64 = 12;

/// Load a product the caller may modify: admins any, vendors their own.
async fn editable_product(state: &AppState, identity: Identity, id: Uuid) -> Result<Product, AppError> {
    let product = Product::find(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    if let Identity::Vendor(vendor_id) = identity {
        if product.vendor_id != Some(vendor_id) {
            return Err(AppError::Forbidden("You can only modify your own products".into()));
        }
    }
    Ok(product)
}

async fn flag_in_offer(state: &AppState, offer_type: &str, product_id: Uuid) {
    let window = OfferProduct::starting_now(product_id, FLAGGED_OFFER_DAYS);
    let result = Offer::modify_products(&state.pool, offer_type, None, true, None, |products| {
        merge_products(products, std::slice::from_ref(&window));
        Ok(())
    })
    .await;
    if let Err(e) = result {
        tracing::warn!(%product_id, offer_type, error = %e, "failed to add product to offer");
    }
}

#[axum::debug_handler]
pub async fn add_product(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> ApiResult<ProductView> {
    let form = FormData::read(multipart).await?;
    let input: ProductInput = form
        .json("product")?
        .ok_or_else(|| AppError::Validation("product is required".into()))?;
    input.validate()?;
    input.check_prices()?;

    if !lineage_matches(&state.pool, input.section_id, input.category_id, input.subcategory_id).await? {
        return Err(AppError::BadRequest("Invalid section, category or subcategory".into()));
    }

    let duplicates = Product::duplicates(
        &state.pool,
        &input.name,
        input.plu_code.as_deref(),
        input.model_number.as_deref(),
    )
    .await?;
    if !duplicates.is_empty() {
        return Err(AppError::Conflict(duplicates.join(", ")));
    }

    let mut images = input.images.clone();
    images.extend(form.upload_all("images", &state.storage, IMAGE_FOLDER).await?);
    if let Some(link) = input.image_link.as_deref().filter(|l| !l.trim().is_empty()) {
        images.extend(state.drive.import_images(link, &state.storage, IMAGE_FOLDER).await?);
    }

    let vendor_id = match identity {
        Identity::Vendor(id) => Some(id),
        _ => input.vendor_id,
    };
    let (best_seller, daily_offer) = (input.is_best_seller, input.is_daily_offer);
    let product = Product::create(&state.pool, NewProduct::from_input(input, vendor_id, images)).await?;

    if best_seller {
        flag_in_offer(&state, BEST_SELLING, product.id).await;
    }
    if daily_offer {
        flag_in_offer(&state, DAILY_OFFER, product.id).await;
    }

    tracing::info!(product_id = %product.id, ?vendor_id, "product created");
    Ok((StatusCode::CREATED, success_with_message("Product added successfully", product.into())))
}

#[axum::debug_handler]
pub async fn edit_product(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> ApiResult<ProductView> {
    let form = FormData::read(multipart).await?;
    let update: ProductUpdate = form
        .json("product")?
        .ok_or_else(|| AppError::Validation("product is required".into()))?;
    update.validate()?;
    check_prices(update.actual_price, update.selling_price)?;
    let to_delete: Vec<String> = form.json("to_delete_images")?.unwrap_or_default();

    let current = editable_product(&state, identity, update.id).await?;

    if update.section_id.is_some() || update.category_id.is_some() || update.subcategory_id.is_some() {
        let section = update.section_id.unwrap_or(current.section_id);
        let category = update.category_id.unwrap_or(current.category_id);
        let subcategory = update.subcategory_id.unwrap_or(current.subcategory_id);
        if !lineage_matches(&state.pool, section, category, subcategory).await? {
            return Err(AppError::BadRequest("Invalid section, category or subcategory".into()));
        }
    }

    if let Some(name) = &update.name {
        if let Some(other) = Product::find_by_name(&state.pool, name).await? {
            if other.id != current.id {
                return Err(AppError::Conflict("Name already exists".into()));
            }
        }
    }

    let mut images: Vec<String> = current
        .images
        .iter()
        .filter(|url| !to_delete.contains(url))
        .cloned()
        .collect();
    images.extend(form.upload_all("images", &state.storage, IMAGE_FOLDER).await?);

    let product = Product::update(&state.pool, &update, &images).await?;

    for url in current.images.iter().filter(|url| to_delete.contains(url)) {
        if let Err(e) = state.storage.delete(url).await {
            tracing::warn!(%url, error = %e, "failed to delete product image");
        }
    }

    Ok((StatusCode::OK, success_with_message("Product updated successfully", product.into())))
}

#[axum::debug_handler]
pub async fn get_products(State(state): State<AppState>) -> ApiResult<Vec<ProductView>> {
    let products = Product::list(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(views(products))))
}

#[axum::debug_handler]
pub async fn get_products_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductDetail> {
    let product = Product::find(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;

    let (section, category, subcategory) = tokio::try_join!(
        MainMenu::find(&state.pool, product.section_id),
        Category::find(&state.pool, product.category_id),
        Subcategory::find(&state.pool, product.subcategory_id),
    )?;

    Ok((
        StatusCode::OK,
        success_to_api_response(ProductDetail {
            product: product.into(),
            section,
            category,
            subcategory,
        }),
    ))
}

/// Paginated search shared with the vendor product listing.
pub(crate) async fn search_page(
    state: &AppState,
    filter: &ProductFilter,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<ProductPage, AppError> {
    let (page, limit) = resolve_page(page, limit, DEFAULT_PAGE_SIZE);
    let offset = Pagination::new(page, limit, 0).offset();

    let (products, total) = Product::search(&state.pool, filter, limit, offset).await?;
    Ok(ProductPage {
        products: views(products),
        pagination: Pagination::new(page, limit, total),
    })
}

#[axum::debug_handler]
pub async fn get_products_by_query(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<ProductPage> {
    if let Some(id) = query.id {
        let product = Product::find(&state.pool, id)
            .await?
            .ok_or_else(|| AppError::not_found("Product"))?;
        return Ok((
            StatusCode::OK,
            success_to_api_response(ProductPage {
                products: vec![product.into()],
                pagination: Pagination::new(1, 1, 1),
            }),
        ));
    }

    let filter = ProductFilter::from(&query);
    let page = search_page(&state, &filter, query.page, query.limit).await?;
    Ok((StatusCode::OK, success_to_api_response(page)))
}

#[axum::debug_handler]
pub async fn get_filters(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<ProductFacets> {
    // only the menu scope narrows the facets
    let filter = ProductFilter {
        section: query.section,
        category: query.category,
        subcategory: query.subcategory,
        ..Default::default()
    };

    let (brand, spec_rows, price) = tokio::try_join!(
        Product::brands(&state.pool, &filter),
        Product::spec_values(&state.pool, &filter),
        Product::price_buckets(&state.pool, &filter),
    )?;

    Ok((
        StatusCode::OK,
        success_to_api_response(ProductFacets {
            brand,
            price,
            specs: bucket_spec_values(spec_rows),
        }),
    ))
}

fn grouped_filter(query: &ProductQuery, params: &HashMap<String, String>) -> ProductFilter {
    let mut filter = ProductFilter::from(query);
    filter.spec_values = spec_value_groups(params);
    filter.is_active = Some(true);
    filter
}

#[axum::debug_handler]
pub async fn get_products_by_main_menu(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ProductQuery>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<MenuProducts>> {
    if MainMenu::find(&state.pool, id).await?.is_none() {
        return Err(AppError::not_found("Main menu"));
    }

    let mut filter = grouped_filter(&query, &params);
    filter.section = Some(id);

    let (categories, products) = tokio::try_join!(
        Category::list_by_section(&state.pool, id),
        Product::search_all(&state.pool, &filter),
    )?;
    let menus = categories
        .into_iter()
        .map(|c| (c.id, c.menu_name, c.slug))
        .collect();

    Ok((
        StatusCode::OK,
        success_to_api_response(group_by_menu(menus, products, |p| p.category_id)),
    ))
}

#[axum::debug_handler]
pub async fn get_products_by_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ProductQuery>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Vec<MenuProducts>> {
    if Category::find(&state.pool, id).await?.is_none() {
        return Err(AppError::not_found("Category"));
    }

    let mut filter = grouped_filter(&query, &params);
    filter.category = Some(id);

    let (subcategories, products) = tokio::try_join!(
        Subcategory::list_by_category(&state.pool, id),
        Product::search_all(&state.pool, &filter),
    )?;
    let menus = subcategories
        .into_iter()
        .map(|s| (s.id, s.menu_name, s.slug))
        .collect();

    Ok((
        StatusCode::OK,
        success_to_api_response(group_by_menu(menus, products, |p| p.subcategory_id)),
    ))
}

#[axum::debug_handler]
pub async fn change_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductView> {
    editable_product(&state, identity, id).await?;
    let product = Product::toggle_status(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok((StatusCode::OK, success_with_message("Product status updated", product.into())))
}

#[axum::debug_handler]
pub async fn change_stock_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductView> {
    editable_product(&state, identity, id).await?;
    let product = Product::toggle_stock_status(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    Ok((StatusCode::OK, success_with_message("Stock status updated", product.into())))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    fn resolve(&self, default: i64) -> usize {
        self.limit.filter(|l| *l > 0).unwrap_or(default).min(MAX_PAGE_SIZE) as usize
    }
}

async fn offer_products(state: &AppState, offer_type: &str, limit: usize) -> Result<Vec<ProductView>, AppError> {
    let ids = Offer::active_product_ids(&state.pool, offer_type).await?;
    let products = Product::by_ids(&state.pool, &ids).await?;
    Ok(products
        .into_iter()
        .filter(|p| p.is_active)
        .take(limit)
        .map(ProductView::from)
        .collect())
}

#[axum::debug_handler]
pub async fn get_best_sellers(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<ProductView>> {
    let products = offer_products(&state, BEST_SELLING, query.resolve(10)).await?;
    Ok((StatusCode::OK, success_to_api_response(products)))
}

#[axum::debug_handler]
pub async fn get_daily_offers(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Vec<ProductView>> {
    let products = offer_products(&state, DAILY_OFFER, query.resolve(10)).await?;
    Ok((StatusCode::OK, success_to_api_response(products)))
}

#[derive(Debug, Deserialize)]
pub struct DiscountQuery {
    pub min_discount: Option<Decimal>,
    pub limit: Option<i64>,
}

#[axum::debug_handler]
pub async fn get_discounted_products(
    State(state): State<AppState>,
    Query(query): Query<DiscountQuery>,
) -> ApiResult<Vec<ProductView>> {
    let min_discount = query.min_discount.unwrap_or(Decimal::TEN);
    let limit = query.limit.filter(|l| *l > 0).unwrap_or(20).min(MAX_PAGE_SIZE);
    let products = Product::discounted(&state.pool, min_discount, limit).await?;
    Ok((StatusCode::OK, success_to_api_response(views(products))))
}

#[axum::debug_handler]
pub async fn check_duplicate_product(
    State(state): State<AppState>,
    Json(candidates): Json<Vec<DuplicateCandidate>>,
) -> ApiResult<Vec<DuplicateReport>> {
    if candidates.is_empty() {
        return Err(AppError::Validation("at least one product is required".into()));
    }

    let mut reports = Vec::new();
    for (index, candidate) in candidates.into_iter().enumerate() {
        let errors = Product::duplicates(
            &state.pool,
            &candidate.name,
            candidate.plu_code.as_deref(),
            candidate.model_number.as_deref(),
        )
        .await?;
        if !errors.is_empty() {
            reports.push(DuplicateReport {
                index,
                name: candidate.name,
                errors,
            });
        }
    }

    let clean = reports.is_empty();
    Ok((
        StatusCode::OK,
        Json(ApiResponse {
            status: clean,
            code: if clean { error_codes::SUCCESS } else { error_codes::ALREADY_EXISTS },
            message: if clean {
                "No duplicates found".to_string()
            } else {
                format!("{} duplicate product(s) found", reports.len())
            },
            data: Some(reports),
        }),
    ))
}

async fn import_one(
    state: &AppState,
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    item: BulkProduct,
    vendor_id: Option<Uuid>,
) -> Result<Product, AppError> {
    let missing = item.missing_fields();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!("Missing required fields: {}", missing.join(", "))));
    }
    check_prices(item.actual_price, item.selling_price)?;

    let name = item.name.unwrap_or_default();
    let images = match item.image_links.as_deref().filter(|l| !l.trim().is_empty()) {
        Some(link) => state.drive.import_images(link, &state.storage, IMAGE_FOLDER).await?,
        None => Vec::new(),
    };

    // a failed statement must not poison the batch transaction
    let mut savepoint = sqlx::Connection::begin(&mut **tx).await?;

    let duplicates = Product::duplicates(
        &mut *savepoint,
        &name,
        item.plu_code.as_deref(),
        item.model_number.as_deref(),
    )
    .await?;
    if !duplicates.is_empty() {
        return Err(AppError::Conflict(duplicates.join(", ")));
    }

    let (section_id, category_id, subcategory_id) = resolve_by_names(
        &mut *savepoint,
        item.section.as_deref().unwrap_or_default(),
        item.category.as_deref().unwrap_or_default(),
        item.subcategory.as_deref().unwrap_or_default(),
    )
    .await?
    .ok_or_else(|| AppError::BadRequest("Section, category or subcategory not found".into()))?;

    let product = Product::create(
        &mut *savepoint,
        NewProduct {
            section_id,
            category_id,
            subcategory_id,
            vendor_id,
            name,
            header_name: item.header_name,
            brand: item.brand.unwrap_or_default(),
            model_number: item.model_number,
            plu_code: item.plu_code,
            item_code: None,
            description: item.description.unwrap_or_default(),
            images,
            tags: Vec::new(),
            actual_price: item.actual_price.unwrap_or_default(),
            selling_price: item.selling_price.unwrap_or_default(),
            stock: item.stock.unwrap_or(0),
            warranty: item.warranty,
            manufacturing_date: item.manufacturing_date,
            weight: item.weight,
            size: item.size,
            specifications: item.specifications,
        },
    )
    .await?;

    savepoint.commit().await?;
    Ok(product)
}

#[axum::debug_handler]
pub async fn import_product(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(items): Json<Vec<BulkProduct>>,
) -> ApiResult<Vec<ImportOutcome>> {
    if items.is_empty() {
        return Err(AppError::Validation("at least one product is required".into()));
    }
    let vendor_id = match identity {
        Identity::Vendor(id) => Some(id),
        _ => None,
    };

    let mut tx = state.pool.begin().await?;
    let mut outcomes = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let name = item.name.clone();
        match import_one(&state, &mut tx, item, vendor_id).await {
            Ok(product) => outcomes.push(ImportOutcome {
                index,
                name,
                success: true,
                product_id: Some(product.id),
                error: None,
            }),
            Err(e) => outcomes.push(ImportOutcome {
                index,
                name,
                success: false,
                product_id: None,
                error: Some(e.to_string()),
            }),
        }
    }

    let succeeded = outcomes.iter().filter(|o| o.success).count();
    let failed = outcomes.len() - succeeded;
    let message = format!("Bulk import completed. Success: {succeeded}, Failed: {failed}");

    if failed > 0 {
        tx.rollback().await?;
        tracing::warn!(succeeded, failed, "bulk import rolled back");
        return Ok((
            StatusCode::MULTI_STATUS,
            Json(ApiResponse {
                status: false,
                code: error_codes::VALIDATION_ERROR,
                message,
                data: Some(outcomes),
            }),
        ));
    }

    tx.commit().await?;
    tracing::info!(succeeded, "bulk import committed");
    Ok((StatusCode::OK, success_with_message(message, outcomes)))
}

#[axum::debug_handler]
pub async fn upload_image(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Vec<String>> {
    let form = FormData::read(multipart).await?;
    let urls = form.upload_all("images", &state.storage, IMAGE_FOLDER).await?;
    if urls.is_empty() {
        return Err(AppError::Validation("at least one image is required".into()));
    }
    Ok((StatusCode::OK, success_with_message("Images uploaded successfully", urls)))
}

#[derive(Debug, Deserialize)]
pub struct SaveImagesRequest {
    pub image_link: String,
}

#[axum::debug_handler]
pub async fn save_images(
    State(state): State<AppState>,
    Json(req): Json<SaveImagesRequest>,
) -> ApiResult<Vec<String>> {
    if req.image_link.trim().is_empty() {
        return Err(AppError::Validation("image_link is required".into()));
    }
    let urls = state
        .drive
        .import_images(&req.image_link, &state.storage, IMAGE_FOLDER)
        .await?;
    Ok((StatusCode::OK, success_with_message("Images saved successfully", urls)))
}
