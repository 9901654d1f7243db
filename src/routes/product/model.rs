use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder, types::Json};
use uuid::Uuid;
use validator::Validate;

use crate::common::Pagination;
use crate::error::AppError;
use crate::routes::menu::model::{Category, MainMenu, Subcategory};
use crate::utils::{discount_percentage, generate_numeric_code};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecEntry {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecSection {
    pub section: String,
    #[serde(default)]
    pub specs: Vec<SpecEntry>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub section_id: Uuid,
    pub category_id: Uuid,
    pub subcategory_id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub name: String,
    pub header_name: Option<String>,
    pub brand: String,
    pub model_number: Option<String>,
    pub plu_code: Option<String>,
    pub item_code: String,
    pub description: String,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub actual_price: Decimal,
    pub selling_price: Decimal,
    pub stock: i32,
    pub warranty: Option<String>,
    pub manufacturing_date: Option<NaiveDate>,
    pub weight: Option<String>,
    pub size: Option<String>,
    #[sqlx(json)]
    pub specifications: Vec<SpecSection>,
    pub ratings: Decimal,
    pub reviews_count: i32,
    pub sales_count: i64,
    pub is_active: bool,
    pub is_in_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product as served to clients, with the derived discount.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub discount_percentage: Decimal,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        let discount_percentage =
            discount_percentage(product.actual_price, product.selling_price, 0);
        Self {
            product,
            discount_percentage,
        }
    }
}

pub fn views(products: Vec<Product>) -> Vec<ProductView> {
    products.into_iter().map(ProductView::from).collect()
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: ProductView,
    pub section: Option<MainMenu>,
    pub category: Option<Category>,
    pub subcategory: Option<Subcategory>,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductView>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct ProductFacets {
    pub brand: Vec<String>,
    pub price: Vec<String>,
    #[serde(flatten)]
    pub specs: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct DuplicateReport {
    pub index: usize,
    pub name: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ImportOutcome {
    pub index: usize,
    pub name: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of the `product` field on create.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProductInput {
    pub section_id: Uuid,
    pub category_id: Uuid,
    pub subcategory_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "name is required"))]
    pub name: String,
    pub header_name: Option<String>,
    #[validate(length(min = 1, max = 128, message = "brand is required"))]
    pub brand: String,
    pub model_number: Option<String>,
    pub plu_code: Option<String>,
    pub item_code: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub actual_price: Decimal,
    pub selling_price: Decimal,
    #[serde(default)]
    #[validate(range(min = 0, message = "stock cannot be negative"))]
    pub stock: i32,
    pub warranty: Option<String>,
    pub manufacturing_date: Option<NaiveDate>,
    pub weight: Option<String>,
    pub size: Option<String>,
    #[serde(default)]
    pub specifications: Vec<SpecSection>,
    #[serde(default)]
    pub images: Vec<String>,
    /// Drive file or folder to pull images from.
    pub image_link: Option<String>,
    /// Owner, honoured for admins only.
    pub vendor_id: Option<Uuid>,
    #[serde(default)]
    pub is_best_seller: bool,
    #[serde(default)]
    pub is_daily_offer: bool,
}

impl ProductInput {
    pub fn check_prices(&self) -> Result<(), AppError> {
        check_prices(Some(self.actual_price), Some(self.selling_price))
    }
}

/// Body of the `product` field on edit; absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProductUpdate {
    pub id: Uuid,
    pub section_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub header_name: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub brand: Option<String>,
    pub model_number: Option<String>,
    pub plu_code: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub actual_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    #[validate(range(min = 0, message = "stock cannot be negative"))]
    pub stock: Option<i32>,
    pub warranty: Option<String>,
    pub manufacturing_date: Option<NaiveDate>,
    pub weight: Option<String>,
    pub size: Option<String>,
    pub specifications: Option<Vec<SpecSection>>,
    pub is_active: Option<bool>,
    pub is_in_stock: Option<bool>,
}

pub fn check_prices(actual: Option<Decimal>, selling: Option<Decimal>) -> Result<(), AppError> {
    if actual.is_some_and(|p| p < Decimal::ZERO) || selling.is_some_and(|p| p < Decimal::ZERO) {
        return Err(AppError::Validation("prices cannot be negative".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    Bestselling,
    Rating,
    #[default]
    Newest,
}

impl ProductSort {
    /// Unknown values fall back to newest first.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("price_asc") => ProductSort::PriceAsc,
            Some("price_desc") => ProductSort::PriceDesc,
            Some("bestselling") => ProductSort::Bestselling,
            Some("rating") => ProductSort::Rating,
            _ => ProductSort::Newest,
        }
    }

    pub fn order_by(self) -> &'static str {
        match self {
            ProductSort::PriceAsc => "selling_price ASC, created_at DESC",
            ProductSort::PriceDesc => "selling_price DESC, created_at DESC",
            ProductSort::Bestselling => "sales_count DESC, created_at DESC",
            ProductSort::Rating => "ratings DESC, created_at DESC",
            ProductSort::Newest => "created_at DESC",
        }
    }
}

/// Query-string filters shared by the listing endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub id: Option<Uuid>,
    pub section: Option<Uuid>,
    pub category: Option<Uuid>,
    pub subcategory: Option<Uuid>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub vendor_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

/// Resolved filter set, built from a query plus route context.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub section: Option<Uuid>,
    pub category: Option<Uuid>,
    pub subcategory: Option<Uuid>,
    pub vendor_id: Option<Uuid>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
    /// Every group must match at least one specification value.
    pub spec_values: Vec<Vec<String>>,
    pub sort: ProductSort,
}

impl From<&ProductQuery> for ProductFilter {
    fn from(q: &ProductQuery) -> Self {
        Self {
            section: q.section,
            category: q.category,
            subcategory: q.subcategory,
            vendor_id: q.vendor_id,
            brand: q.brand.clone().filter(|b| !b.trim().is_empty()),
            min_price: q.min_price,
            max_price: q.max_price,
            search: q.search.clone().filter(|s| !s.trim().is_empty()),
            is_active: q.is_active,
            spec_values: Vec::new(),
            sort: ProductSort::parse(q.sort.as_deref()),
        }
    }
}

const RESERVED_QUERY_KEYS: &[&str] = &[
    "id", "section", "category", "subcategory", "brand", "min_price", "max_price", "search",
    "sort", "page", "limit", "vendor_id", "is_active",
];

/// Unreserved query keys become specification value groups; commas separate alternatives.
pub fn spec_value_groups(params: &HashMap<String, String>) -> Vec<Vec<String>> {
    let mut keys: Vec<&String> = params
        .keys()
        .filter(|k| !RESERVED_QUERY_KEYS.contains(&k.as_str()))
        .collect();
    keys.sort();
    keys.into_iter()
        .filter_map(|k| {
            let values: Vec<String> = params[k]
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            (!values.is_empty()).then_some(values)
        })
        .collect()
}

fn push_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, f: &'a ProductFilter) {
    qb.push(" WHERE TRUE");
    if let Some(id) = f.section {
        qb.push(" AND section_id = ").push_bind(id);
    }
    if let Some(id) = f.category {
        qb.push(" AND category_id = ").push_bind(id);
    }
    if let Some(id) = f.subcategory {
        qb.push(" AND subcategory_id = ").push_bind(id);
    }
    if let Some(id) = f.vendor_id {
        qb.push(" AND vendor_id = ").push_bind(id);
    }
    if let Some(active) = f.is_active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    if let Some(brand) = &f.brand {
        qb.push(" AND LOWER(brand) = LOWER(").push_bind(brand).push(")");
    }
    if let Some(min) = f.min_price {
        qb.push(" AND selling_price >= ").push_bind(min);
    }
    if let Some(max) = f.max_price {
        qb.push(" AND selling_price <= ").push_bind(max);
    }
    if let Some(search) = &f.search {
        // user text is matched literally
        let pattern = regex::escape(search.trim());
        qb.push(" AND (name ~* ")
            .push_bind(pattern.clone())
            .push(" OR description ~* ")
            .push_bind(pattern.clone())
            .push(" OR model_number ~* ")
            .push_bind(pattern.clone())
            .push(
                " OR EXISTS (SELECT 1 FROM jsonb_array_elements(specifications) s, \
                 jsonb_array_elements(s->'specs') e WHERE e->>'value' ~* ",
            )
            .push_bind(pattern)
            .push("))");
    }
    for group in &f.spec_values {
        qb.push(
            " AND EXISTS (SELECT 1 FROM jsonb_array_elements(specifications) s, \
             jsonb_array_elements(s->'specs') e WHERE e->>'value' = ANY(",
        )
        .push_bind(group)
        .push("))");
    }
}

/// Facet name, specification section and label it is read from.
pub const SPEC_FACETS: &[(&str, &str, &str)] = &[
    ("processor", "Processor And Memory Features", "Processor Name"),
    ("generation", "Processor And Memory Features", "Processor Generation"),
    ("ram", "Processor And Memory Features", "RAM"),
    ("storage_type", "Processor And Memory Features", "Storage Type"),
    ("ssd_capacity", "Processor And Memory Features", "SSD Capacity"),
    ("graphics", "Processor And Memory Features", "Graphic Processor"),
    ("screen_size", "Display And Audio Features", "Screen Size"),
    ("resolution", "Display And Audio Features", "Screen Resolution"),
    ("os", "Operating System", "Operating System"),
    ("color", "General", "Color"),
];

/// Bucket distinct (section, label, value) rows into the named facets.
pub fn bucket_spec_values(rows: Vec<(String, String, String)>) -> BTreeMap<String, Vec<String>> {
    let mut sets: BTreeMap<&str, BTreeSet<String>> =
        SPEC_FACETS.iter().map(|(name, _, _)| (*name, BTreeSet::new())).collect();
    for (section, label, value) in rows {
        if value.trim().is_empty() {
            continue;
        }
        for (name, facet_section, facet_label) in SPEC_FACETS {
            if section == *facet_section && label == *facet_label {
                if let Some(set) = sets.get_mut(name) {
                    set.insert(value.clone());
                }
            }
        }
    }
    sets.into_iter()
        .map(|(name, values)| (name.to_string(), values.into_iter().collect()))
        .collect()
}

#[derive(Debug, Serialize)]
pub struct MenuProducts {
    pub id: Uuid,
    pub menu_name: String,
    pub slug: String,
    pub products: Vec<ProductView>,
}

/// Place each product under the menu `key` points at; menus keep their order.
pub fn group_by_menu(
    menus: Vec<(Uuid, String, String)>,
    products: Vec<Product>,
    key: impl Fn(&Product) -> Uuid,
) -> Vec<MenuProducts> {
    let mut groups: Vec<MenuProducts> = menus
        .into_iter()
        .map(|(id, menu_name, slug)| MenuProducts {
            id,
            menu_name,
            slug,
            products: Vec::new(),
        })
        .collect();
    let index: HashMap<Uuid, usize> = groups.iter().enumerate().map(|(i, g)| (g.id, i)).collect();
    for product in products {
        if let Some(&i) = index.get(&key(&product)) {
            groups[i].products.push(product.into());
        }
    }
    groups
}

/// One row of a bulk import, everything optional so missing fields can be reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkProduct {
    pub name: Option<String>,
    pub header_name: Option<String>,
    pub brand: Option<String>,
    pub model_number: Option<String>,
    pub plu_code: Option<String>,
    pub section: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub actual_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub stock: Option<i32>,
    pub warranty: Option<String>,
    pub manufacturing_date: Option<NaiveDate>,
    pub weight: Option<String>,
    pub size: Option<String>,
    #[serde(default)]
    pub specifications: Vec<SpecSection>,
    pub image_links: Option<String>,
}

impl BulkProduct {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let text = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
        let mut missing = Vec::new();
        if text(&self.name) {
            missing.push("name");
        }
        if text(&self.brand) {
            missing.push("brand");
        }
        if text(&self.model_number) {
            missing.push("model_number");
        }
        if text(&self.section) {
            missing.push("section");
        }
        if text(&self.category) {
            missing.push("category");
        }
        if text(&self.subcategory) {
            missing.push("subcategory");
        }
        if text(&self.description) {
            missing.push("description");
        }
        if self.actual_price.is_none() {
            missing.push("actual_price");
        }
        if self.selling_price.is_none() {
            missing.push("selling_price");
        }
        if text(&self.plu_code) {
            missing.push("plu_code");
        }
        missing
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub name: String,
    pub plu_code: Option<String>,
    pub model_number: Option<String>,
}

/// Fields needed to insert a product row.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub section_id: Uuid,
    pub category_id: Uuid,
    pub subcategory_id: Uuid,
    pub vendor_id: Option<Uuid>,
    pub name: String,
    pub header_name: Option<String>,
    pub brand: String,
    pub model_number: Option<String>,
    pub plu_code: Option<String>,
    pub item_code: Option<String>,
    pub description: String,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub actual_price: Decimal,
    pub selling_price: Decimal,
    pub stock: i32,
    pub warranty: Option<String>,
    pub manufacturing_date: Option<NaiveDate>,
    pub weight: Option<String>,
    pub size: Option<String>,
    pub specifications: Vec<SpecSection>,
}

impl NewProduct {
    pub fn from_input(input: ProductInput, vendor_id: Option<Uuid>, images: Vec<String>) -> Self {
        Self {
            section_id: input.section_id,
            category_id: input.category_id,
            subcategory_id: input.subcategory_id,
            vendor_id,
            name: input.name.trim().to_string(),
            header_name: input.header_name,
            brand: input.brand.trim().to_string(),
            model_number: input.model_number,
            plu_code: input.plu_code,
            item_code: input.item_code,
            description: input.description,
            images,
            tags: input.tags,
            actual_price: input.actual_price,
            selling_price: input.selling_price,
            stock: input.stock,
            warranty: input.warranty,
            manufacturing_date: input.manufacturing_date,
            weight: input.weight,
            size: input.size,
            specifications: input.specifications,
        }
    }
}

impl Product {
    pub async fn create<'e, E: PgExecutor<'e>>(executor: E, new: NewProduct) -> Result<Self, sqlx::Error> {
        let item_code = new
            .item_code
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| generate_numeric_code(10));
        let is_in_stock = new.stock > 0;

        sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                id, section_id, category_id, subcategory_id, vendor_id, name, header_name,
                brand, model_number, plu_code, item_code, description, images, tags,
                actual_price, selling_price, stock, warranty, manufacturing_date, weight,
                size, specifications, is_in_stock
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20, $21, $22, $23)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.section_id)
        .bind(new.category_id)
        .bind(new.subcategory_id)
        .bind(new.vendor_id)
        .bind(new.name)
        .bind(new.header_name)
        .bind(new.brand)
        .bind(new.model_number)
        .bind(new.plu_code)
        .bind(item_code)
        .bind(new.description)
        .bind(new.images)
        .bind(new.tags)
        .bind(new.actual_price)
        .bind(new.selling_price)
        .bind(new.stock)
        .bind(new.warranty)
        .bind(new.manufacturing_date)
        .bind(new.weight)
        .bind(new.size)
        .bind(Json(new.specifications))
        .bind(is_in_stock)
        .fetch_one(executor)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        update: &ProductUpdate,
        images: &[String],
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                section_id = COALESCE($2, section_id),
                category_id = COALESCE($3, category_id),
                subcategory_id = COALESCE($4, subcategory_id),
                name = COALESCE($5, name),
                header_name = COALESCE($6, header_name),
                brand = COALESCE($7, brand),
                model_number = COALESCE($8, model_number),
                plu_code = COALESCE($9, plu_code),
                description = COALESCE($10, description),
                tags = COALESCE($11, tags),
                actual_price = COALESCE($12, actual_price),
                selling_price = COALESCE($13, selling_price),
                stock = COALESCE($14, stock),
                warranty = COALESCE($15, warranty),
                manufacturing_date = COALESCE($16, manufacturing_date),
                weight = COALESCE($17, weight),
                size = COALESCE($18, size),
                specifications = COALESCE($19, specifications),
                is_active = COALESCE($20, is_active),
                is_in_stock = COALESCE($21, is_in_stock),
                images = $22,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(update.id)
        .bind(update.section_id)
        .bind(update.category_id)
        .bind(update.subcategory_id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.header_name.as_deref())
        .bind(update.brand.as_deref().map(str::trim))
        .bind(update.model_number.as_deref())
        .bind(update.plu_code.as_deref())
        .bind(update.description.as_deref())
        .bind(update.tags.as_deref())
        .bind(update.actual_price)
        .bind(update.selling_price)
        .bind(update.stock)
        .bind(update.warranty.as_deref())
        .bind(update.manufacturing_date)
        .bind(update.weight.as_deref())
        .bind(update.size.as_deref())
        .bind(update.specifications.as_ref().map(Json))
        .bind(update.is_active)
        .bind(update.is_in_stock)
        .bind(images)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE LOWER(name) = LOWER($1)")
            .bind(name.trim())
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
    }

    /// Products for `ids`, returned in the order of `ids`.
    pub async fn by_ids(pool: &PgPool, ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await?;
        let mut by_id: HashMap<Uuid, Product> = rows.into_iter().map(|p| (p.id, p)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    pub async fn count_existing(pool: &PgPool, ids: &[Uuid]) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(pool)
            .await
    }

    pub async fn ids_by_names(pool: &PgPool, names: &[String]) -> Result<Vec<(Uuid, String)>, sqlx::Error> {
        let lowered: Vec<String> = names.iter().map(|n| n.trim().to_lowercase()).collect();
        sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, LOWER(name) FROM products WHERE LOWER(name) = ANY($1)",
        )
        .bind(lowered)
        .fetch_all(pool)
        .await
    }

    pub async fn ids_for_vendor(pool: &PgPool, vendor_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE vendor_id = $1")
            .bind(vendor_id)
            .fetch_all(pool)
            .await
    }

    /// Filtered page plus the total number of matches.
    pub async fn search(
        pool: &PgPool,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Self>, i64), sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(pool).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM products");
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY ")
            .push(filter.sort.order_by())
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let products = select.build_query_as::<Product>().fetch_all(pool).await?;

        Ok((products, total))
    }

    /// Every match, unpaginated.
    pub async fn search_all(pool: &PgPool, filter: &ProductFilter) -> Result<Vec<Self>, sqlx::Error> {
        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM products");
        push_filters(&mut select, filter);
        select.push(" ORDER BY ").push(filter.sort.order_by());
        select.build_query_as::<Product>().fetch_all(pool).await
    }

    pub async fn brands(pool: &PgPool, filter: &ProductFilter) -> Result<Vec<String>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT DISTINCT brand FROM products");
        push_filters(&mut qb, filter);
        qb.push(" ORDER BY brand");
        qb.build_query_scalar().fetch_all(pool).await
    }

    pub async fn spec_values(
        pool: &PgPool,
        filter: &ProductFilter,
    ) -> Result<Vec<(String, String, String)>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT DISTINCT s->>'section', e->>'label', e->>'value' \
             FROM products, jsonb_array_elements(specifications) s, \
             jsonb_array_elements(s->'specs') e",
        );
        push_filters(&mut qb, filter);
        qb.push(" AND e->>'value' IS NOT NULL");
        qb.build_query_as().fetch_all(pool).await
    }

    pub async fn price_buckets(pool: &PgPool, filter: &ProductFilter) -> Result<Vec<String>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT bucket FROM (SELECT DISTINCT CASE \
             WHEN selling_price < 2000 THEN '< 2000' \
             WHEN selling_price <= 2500 THEN '2000 - 2500' \
             ELSE '> 2500' END AS bucket FROM products",
        );
        push_filters(&mut qb, filter);
        qb.push(") buckets ORDER BY bucket");
        qb.build_query_scalar().fetch_all(pool).await
    }

    /// Active products at least `min_discount` percent off, deepest first.
    pub async fn discounted(pool: &PgPool, min_discount: Decimal, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_active AND actual_price > 0
              AND (actual_price - selling_price) / actual_price * 100 >= $1
            ORDER BY (actual_price - selling_price) / actual_price DESC
            LIMIT $2
            "#,
        )
        .bind(min_discount)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn toggle_status(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            "UPDATE products SET is_active = NOT is_active, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn toggle_stock_status(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            "UPDATE products SET is_in_stock = NOT is_in_stock, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// One statement for all lines of an order.
    pub async fn increment_sales(pool: &PgPool, lines: &[(Uuid, i64)]) -> Result<u64, sqlx::Error> {
        let ids: Vec<Uuid> = lines.iter().map(|(id, _)| *id).collect();
        let quantities: Vec<i64> = lines.iter().map(|(_, q)| *q).collect();
        let result = sqlx::query(
            r#"
            UPDATE products p
            SET sales_count = p.sales_count + v.quantity
            FROM (SELECT * FROM UNNEST($1::uuid[], $2::bigint[])) AS v(id, quantity)
            WHERE p.id = v.id
            "#,
        )
        .bind(ids)
        .bind(quantities)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Human-readable clashes on name, PLU code or model number.
    pub async fn duplicates<'e, E: PgExecutor<'e>>(
        executor: E,
        name: &str,
        plu_code: Option<&str>,
        model_number: Option<&str>,
    ) -> Result<Vec<String>, sqlx::Error> {
        let name = name.trim().to_lowercase();
        let plu_code = plu_code.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty());
        let model_number = model_number
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty());

        let clash = sqlx::query_as::<_, (bool, bool, bool)>(
            r#"
            SELECT
                COALESCE(BOOL_OR(LOWER(name) = $1), FALSE),
                COALESCE(BOOL_OR($2::text IS NOT NULL AND LOWER(plu_code) = $2), FALSE),
                COALESCE(BOOL_OR($3::text IS NOT NULL AND LOWER(model_number) = $3), FALSE)
            FROM products
            WHERE LOWER(name) = $1 OR LOWER(plu_code) = $2 OR LOWER(model_number) = $3
            "#,
        )
        .bind(&name)
        .bind(&plu_code)
        .bind(&model_number)
        .fetch_one(executor)
        .await?;

        let mut errors = Vec::new();
        if clash.0 {
            errors.push("Name already exists".to_string());
        }
        if clash.1 {
            errors.push("PLU Code already exists".to_string());
        }
        if clash.2 {
            errors.push("Model Number already exists".to_string());
        }
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(category: Uuid, subcategory: Uuid) -> Product {
        Product {
            id: Uuid::new_v4(),
            section_id: Uuid::new_v4(),
            category_id: category,
            subcategory_id: subcategory,
            vendor_id: None,
            name: "ThinkPad".into(),
            header_name: None,
            brand: "Lenovo".into(),
            model_number: None,
            plu_code: None,
            item_code: "0000000001".into(),
            description: String::new(),
            images: vec![],
            tags: vec![],
            actual_price: Decimal::new(2500, 0),
            selling_price: Decimal::new(2000, 0),
            stock: 3,
            warranty: None,
            manufacturing_date: None,
            weight: None,
            size: None,
            specifications: vec![],
            ratings: Decimal::ZERO,
            reviews_count: 0,
            sales_count: 0,
            is_active: true,
            is_in_stock: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sort_parsing_falls_back_to_newest() {
        assert_eq!(ProductSort::parse(Some("price_asc")), ProductSort::PriceAsc);
        assert_eq!(ProductSort::parse(Some("bestselling")), ProductSort::Bestselling);
        assert_eq!(ProductSort::parse(Some("cheapest")), ProductSort::Newest);
        assert_eq!(ProductSort::parse(None), ProductSort::Newest);
        assert!(ProductSort::Rating.order_by().starts_with("ratings DESC"));
    }

    #[test]
    fn view_carries_discount() {
        let view = ProductView::from(product(Uuid::new_v4(), Uuid::new_v4()));
        assert_eq!(view.discount_percentage, Decimal::new(20, 0));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["brand"], "Lenovo");
        assert!(json.get("discount_percentage").is_some());
    }

    #[test]
    fn spec_values_land_in_named_facets() {
        let rows = vec![
            ("Processor And Memory Features".into(), "RAM".into(), "16 GB".into()),
            ("Processor And Memory Features".into(), "RAM".into(), "8 GB".into()),
            ("General".into(), "Color".into(), "Black".into()),
            ("General".into(), "Weight".into(), "1.2 kg".into()),
            ("Operating System".into(), "Operating System".into(), "".into()),
        ];
        let facets = bucket_spec_values(rows);
        assert_eq!(facets["ram"], vec!["16 GB".to_string(), "8 GB".to_string()]);
        assert_eq!(facets["color"], vec!["Black".to_string()]);
        assert!(facets["os"].is_empty());
        assert_eq!(facets.len(), SPEC_FACETS.len());
    }

    #[test]
    fn unreserved_params_become_value_groups() {
        let mut params = HashMap::new();
        params.insert("brand".to_string(), "HP".to_string());
        params.insert("ram".to_string(), "8 GB, 16 GB".to_string());
        params.insert("color".to_string(), " ".to_string());
        let groups = spec_value_groups(&params);
        assert_eq!(groups, vec![vec!["8 GB".to_string(), "16 GB".to_string()]]);
    }

    #[test]
    fn products_grouped_under_their_menu() {
        let laptops = Uuid::new_v4();
        let phones = Uuid::new_v4();
        let menus = vec![
            (laptops, "Laptops".to_string(), "laptops".to_string()),
            (phones, "Phones".to_string(), "phones".to_string()),
        ];
        let products = vec![
            product(laptops, Uuid::new_v4()),
            product(laptops, Uuid::new_v4()),
            product(Uuid::new_v4(), Uuid::new_v4()),
        ];
        let groups = group_by_menu(menus, products, |p| p.category_id);
        assert_eq!(groups[0].products.len(), 2);
        assert!(groups[1].products.is_empty());
    }

    #[test]
    fn bulk_row_reports_missing_fields() {
        let row = BulkProduct {
            name: Some("Pixel".into()),
            brand: Some(" ".into()),
            actual_price: Some(Decimal::new(100, 0)),
            ..Default::default()
        };
        let missing = row.missing_fields();
        assert!(missing.contains(&"brand"));
        assert!(missing.contains(&"selling_price"));
        assert!(!missing.contains(&"name"));
        assert!(!missing.contains(&"actual_price"));
    }

    #[test]
    fn negative_prices_rejected() {
        assert!(check_prices(Some(Decimal::new(-1, 0)), None).is_err());
        assert!(check_prices(Some(Decimal::ONE), Some(Decimal::ONE)).is_ok());
    }
}
