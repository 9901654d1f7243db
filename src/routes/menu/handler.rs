use axum::{
    extract::{Json, Multipart, Path, State},
    http::StatusCode,
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::{ApiResult, AppError},
    utils::{multipart::FormData, slugify, success_to_api_response, success_with_message},
};

use super::model::{
    Category, CategoryNode, MainMenu, MenuLevel, MenuLookup, MenuRename, MenuTree, Subcategory,
    build_menu_tree, menu_exists, rename_menus,
};

const ICON_FOLDER: &str = "categories";

struct NewMenu {
    menu_name: String,
    slug: String,
    icon: Option<String>,
    item_index: i32,
}

/// Shared intake for the three add endpoints: name, slug, duplicate check, icon upload.
async fn read_new_menu(
    state: &AppState,
    level: MenuLevel,
    form: &FormData,
) -> Result<NewMenu, AppError> {
    let menu_name = form.require("menu_name")?.to_string();
    let slug = slugify(&menu_name);
    if slug.is_empty() {
        return Err(AppError::Validation("menu_name must contain letters or digits".into()));
    }
    if menu_exists(&state.pool, level, &menu_name, &slug).await? {
        return Err(AppError::BadRequest("Menu already exists".into()));
    }

    let icon = match form.files_named("icon").next() {
        Some(file) => Some(
            state
                .storage
                .upload(file.bytes.clone(), &file.content_type, ICON_FOLDER)
                .await?,
        ),
        None => None,
    };

    let item_index = form
        .text("item_index")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    Ok(NewMenu {
        menu_name,
        slug,
        icon,
        item_index,
    })
}

fn parse_id(form: &FormData, field: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(form.require(field)?)
        .map_err(|_| AppError::Validation(format!("{field} must be a valid id")))
}

#[axum::debug_handler]
pub async fn add_section(State(state): State<AppState>, multipart: Multipart) -> ApiResult<MainMenu> {
    let form = FormData::read(multipart).await?;
    let new = read_new_menu(&state, MenuLevel::Section, &form).await?;

    let section = MainMenu::create(&state.pool, &new.menu_name, &new.slug, new.icon, new.item_index).await?;
    Ok((StatusCode::CREATED, success_with_message("Section created successfully", section)))
}

#[axum::debug_handler]
pub async fn add_category(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Category> {
    let form = FormData::read(multipart).await?;
    let main_menu_id = parse_id(&form, "main_menu_id")?;
    if MainMenu::find(&state.pool, main_menu_id).await?.is_none() {
        return Err(AppError::not_found("Section"));
    }
    let new = read_new_menu(&state, MenuLevel::Category, &form).await?;

    let category = Category::create(
        &state.pool,
        main_menu_id,
        &new.menu_name,
        &new.slug,
        new.icon,
        new.item_index,
    )
    .await?;
    Ok((StatusCode::CREATED, success_with_message("Category created successfully", category)))
}

#[axum::debug_handler]
pub async fn add_subcategory(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Subcategory> {
    let form = FormData::read(multipart).await?;
    let category_id = parse_id(&form, "category_id")?;
    if Category::find(&state.pool, category_id).await?.is_none() {
        return Err(AppError::not_found("Category"));
    }
    let new = read_new_menu(&state, MenuLevel::Subcategory, &form).await?;

    let subcategory = Subcategory::create(
        &state.pool,
        category_id,
        &new.menu_name,
        &new.slug,
        new.icon,
        new.item_index,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        success_with_message("Subcategory created successfully", subcategory),
    ))
}

#[axum::debug_handler]
pub async fn get_menus(State(state): State<AppState>) -> ApiResult<Vec<MenuTree>> {
    let (sections, categories, subcategories) = tokio::try_join!(
        MainMenu::list(&state.pool),
        Category::list(&state.pool),
        Subcategory::list(&state.pool),
    )?;
    Ok((
        StatusCode::OK,
        success_to_api_response(build_menu_tree(sections, categories, subcategories)),
    ))
}

/// Looks the id up as a section, then a category, then a subcategory.
#[axum::debug_handler]
pub async fn get_menu_by_id(
    State(state): State<AppState>,
    Path(menu_id): Path<Uuid>,
) -> ApiResult<MenuLookup> {
    if let Some(section) = MainMenu::find(&state.pool, menu_id).await? {
        let categories = Category::list_by_section(&state.pool, menu_id).await?;
        let ids: Vec<Uuid> = categories.iter().map(|c| c.id).collect();
        let subcategories = Subcategory::list_by_categories(&state.pool, &ids).await?;
        let mut tree = build_menu_tree(vec![section], categories, subcategories);
        let tree = tree.pop().ok_or_else(|| AppError::not_found("Menu"))?;
        return Ok((StatusCode::OK, success_to_api_response(MenuLookup::Section { tree })));
    }

    if let Some(category) = Category::find(&state.pool, menu_id).await? {
        let (main_menu, subcategories) = tokio::try_join!(
            MainMenu::find(&state.pool, category.main_menu_id),
            Subcategory::list_by_category(&state.pool, menu_id),
        )?;
        return Ok((
            StatusCode::OK,
            success_to_api_response(MenuLookup::Category {
                node: CategoryNode {
                    category,
                    subcategories,
                },
                main_menu,
            }),
        ));
    }

    if let Some(subcategory) = Subcategory::find(&state.pool, menu_id).await? {
        let category = Category::find(&state.pool, subcategory.category_id).await?;
        let main_menu = match &category {
            Some(c) => MainMenu::find(&state.pool, c.main_menu_id).await?,
            None => None,
        };
        return Ok((
            StatusCode::OK,
            success_to_api_response(MenuLookup::Subcategory {
                subcategory,
                category,
                main_menu,
            }),
        ));
    }

    Err(AppError::NotFound(
        "No section, category or subcategory found with this id".into(),
    ))
}

#[derive(Debug, Serialize)]
pub struct SubcategoryListing {
    pub category: Category,
    pub subcategories: Vec<Subcategory>,
}

#[axum::debug_handler]
pub async fn get_subcategories_by_id(
    State(state): State<AppState>,
    Path(category_id): Path<Uuid>,
) -> ApiResult<SubcategoryListing> {
    let category = Category::find(&state.pool, category_id)
        .await?
        .ok_or_else(|| AppError::not_found("Category"))?;
    let subcategories = Subcategory::list_by_category(&state.pool, category_id).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(SubcategoryListing {
            category,
            subcategories,
        }),
    ))
}

async fn rename(state: &AppState, level: MenuLevel, items: Vec<MenuRename>) -> ApiResult<u64> {
    if items.is_empty() {
        return Err(AppError::Validation("At least one menu is required".into()));
    }
    for item in &items {
        item.validate()?;
        if slugify(&item.menu_name).is_empty() {
            return Err(AppError::Validation("Menu name and slug are required".into()));
        }
    }
    let updated = rename_menus(&state.pool, level, &items).await?;
    Ok((StatusCode::OK, success_with_message("Menus updated successfully", updated)))
}

#[axum::debug_handler]
pub async fn update_section(
    State(state): State<AppState>,
    Json(items): Json<Vec<MenuRename>>,
) -> ApiResult<u64> {
    rename(&state, MenuLevel::Section, items).await
}

#[axum::debug_handler]
pub async fn update_categories(
    State(state): State<AppState>,
    Json(items): Json<Vec<MenuRename>>,
) -> ApiResult<u64> {
    rename(&state, MenuLevel::Category, items).await
}

#[axum::debug_handler]
pub async fn update_subcategories(
    State(state): State<AppState>,
    Json(items): Json<Vec<MenuRename>>,
) -> ApiResult<u64> {
    rename(&state, MenuLevel::Subcategory, items).await
}

/// Replace a category icon.
#[axum::debug_handler]
pub async fn update_menus(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Category> {
    let form = FormData::read(multipart).await?;
    let category_id = parse_id(&form, "category_id")?;
    let existing = Category::find(&state.pool, category_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Menu not found".into()))?;

    let icon = match form.files_named("icon").next() {
        Some(file) => Some(
            state
                .storage
                .upload(file.bytes.clone(), &file.content_type, ICON_FOLDER)
                .await?,
        ),
        None => None,
    };

    let category = Category::set_icon(&state.pool, category_id, icon)
        .await?
        .ok_or_else(|| AppError::NotFound("Menu not found".into()))?;

    if let Some(old) = existing.icon.filter(|old| Some(old) != category.icon.as_ref()) {
        if let Err(e) = state.storage.delete(&old).await {
            tracing::warn!(error = %e, icon = %old, "failed to delete replaced icon");
        }
    }
    Ok((StatusCode::OK, success_with_message("Menu updated successfully", category)))
}
