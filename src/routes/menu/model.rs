use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

/// The three levels of the storefront navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuLevel {
    Section,
    Category,
    Subcategory,
}

impl MenuLevel {
    fn table(self) -> &'static str {
        match self {
            MenuLevel::Section => "main_menus",
            MenuLevel::Category => "categories",
            MenuLevel::Subcategory => "subcategories",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MainMenu {
    pub id: Uuid,
    pub menu_name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub item_index: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub main_menu_id: Uuid,
    pub menu_name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub item_index: i32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Subcategory {
    pub id: Uuid,
    pub category_id: Uuid,
    pub menu_name: String,
    pub slug: String,
    pub icon: Option<String>,
    pub item_index: i32,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub subcategories: Vec<Subcategory>,
}

#[derive(Debug, Serialize)]
pub struct MenuTree {
    #[serde(flatten)]
    pub section: MainMenu,
    pub categories: Vec<CategoryNode>,
}

/// Result of looking an id up across all three levels.
#[derive(Debug, Serialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum MenuLookup {
    Section {
        #[serde(flatten)]
        tree: MenuTree,
    },
    Category {
        #[serde(flatten)]
        node: CategoryNode,
        main_menu: Option<MainMenu>,
    },
    Subcategory {
        #[serde(flatten)]
        subcategory: Subcategory,
        category: Option<Category>,
        main_menu: Option<MainMenu>,
    },
}

#[derive(Debug, Deserialize, Validate)]
pub struct MenuRename {
    pub id: Uuid,
    #[validate(length(min = 1, max = 128, message = "menu_name is required"))]
    pub menu_name: String,
    #[serde(default)]
    pub item_index: i32,
}

pub fn build_menu_tree(
    mut sections: Vec<MainMenu>,
    mut categories: Vec<Category>,
    mut subcategories: Vec<Subcategory>,
) -> Vec<MenuTree> {
    sections.sort_by(|a, b| (a.item_index, &a.menu_name).cmp(&(b.item_index, &b.menu_name)));
    categories.sort_by(|a, b| (a.item_index, &a.menu_name).cmp(&(b.item_index, &b.menu_name)));
    subcategories.sort_by(|a, b| (a.item_index, &a.menu_name).cmp(&(b.item_index, &b.menu_name)));

    let mut subs_by_category: HashMap<Uuid, Vec<Subcategory>> = HashMap::new();
    for sub in subcategories {
        subs_by_category.entry(sub.category_id).or_default().push(sub);
    }

    let mut cats_by_section: HashMap<Uuid, Vec<CategoryNode>> = HashMap::new();
    for category in categories {
        let subcategories = subs_by_category.remove(&category.id).unwrap_or_default();
        cats_by_section
            .entry(category.main_menu_id)
            .or_default()
            .push(CategoryNode {
                category,
                subcategories,
            });
    }

    sections
        .into_iter()
        .map(|section| MenuTree {
            categories: cats_by_section.remove(&section.id).unwrap_or_default(),
            section,
        })
        .collect()
}

pub async fn menu_exists(
    pool: &PgPool,
    level: MenuLevel,
    menu_name: &str,
    slug: &str,
) -> Result<bool, sqlx::Error> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE LOWER(menu_name) = LOWER($1) OR slug = $2)",
        level.table()
    );
    sqlx::query_scalar::<_, bool>(&sql)
        .bind(menu_name)
        .bind(slug)
        .fetch_one(pool)
        .await
}

/// Batch rename and reorder inside one transaction.
pub async fn rename_menus(
    pool: &PgPool,
    level: MenuLevel,
    items: &[MenuRename],
) -> Result<u64, sqlx::Error> {
    let sql = format!(
        "UPDATE {} SET menu_name = $2, slug = $3, item_index = $4 WHERE id = $1",
        level.table()
    );
    let mut tx = pool.begin().await?;
    let mut updated = 0;
    for item in items {
        updated += sqlx::query(&sql)
            .bind(item.id)
            .bind(item.menu_name.trim())
            .bind(crate::utils::slugify(&item.menu_name))
            .bind(item.item_index)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;
    Ok(updated)
}

/// True when the three ids form one branch of the tree.
pub async fn lineage_matches(
    pool: &PgPool,
    section_id: Uuid,
    category_id: Uuid,
    subcategory_id: Uuid,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM subcategories s
            JOIN categories c ON c.id = s.category_id
            WHERE s.id = $3 AND c.id = $2 AND c.main_menu_id = $1
        )
        "#,
    )
    .bind(section_id)
    .bind(category_id)
    .bind(subcategory_id)
    .fetch_one(pool)
    .await
}

/// Resolve a (section, category, subcategory) name triple, case-insensitively.
pub async fn resolve_by_names<'e, E: PgExecutor<'e>>(
    executor: E,
    section: &str,
    category: &str,
    subcategory: &str,
) -> Result<Option<(Uuid, Uuid, Uuid)>, sqlx::Error> {
    sqlx::query_as::<_, (Uuid, Uuid, Uuid)>(
        r#"
        SELECT m.id, c.id, s.id
        FROM main_menus m
        JOIN categories c ON c.main_menu_id = m.id
        JOIN subcategories s ON s.category_id = c.id
        WHERE LOWER(m.menu_name) = LOWER($1)
          AND LOWER(c.menu_name) = LOWER($2)
          AND LOWER(s.menu_name) = LOWER($3)
        LIMIT 1
        "#,
    )
    .bind(section.trim())
    .bind(category.trim())
    .bind(subcategory.trim())
    .fetch_optional(executor)
    .await
}

impl MainMenu {
    pub async fn create(
        pool: &PgPool,
        menu_name: &str,
        slug: &str,
        icon: Option<String>,
        item_index: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, MainMenu>(
            r#"
            INSERT INTO main_menus (id, menu_name, slug, icon, item_index)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(menu_name)
        .bind(slug)
        .bind(icon)
        .bind(item_index)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, MainMenu>("SELECT * FROM main_menus WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, MainMenu>("SELECT * FROM main_menus ORDER BY item_index, menu_name")
            .fetch_all(pool)
            .await
    }
}

impl Category {
    pub async fn create(
        pool: &PgPool,
        main_menu_id: Uuid,
        menu_name: &str,
        slug: &str,
        icon: Option<String>,
        item_index: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, main_menu_id, menu_name, slug, icon, item_index)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(main_menu_id)
        .bind(menu_name)
        .bind(slug)
        .bind(icon)
        .bind(item_index)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY item_index, menu_name")
            .fetch_all(pool)
            .await
    }

    pub async fn list_by_section(pool: &PgPool, main_menu_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE main_menu_id = $1 ORDER BY item_index, menu_name",
        )
        .bind(main_menu_id)
        .fetch_all(pool)
        .await
    }

    pub async fn set_icon(pool: &PgPool, id: Uuid, icon: Option<String>) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Category>("UPDATE categories SET icon = $2 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(icon)
            .fetch_optional(pool)
            .await
    }
}

impl Subcategory {
    pub async fn create(
        pool: &PgPool,
        category_id: Uuid,
        menu_name: &str,
        slug: &str,
        icon: Option<String>,
        item_index: i32,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Subcategory>(
            r#"
            INSERT INTO subcategories (id, category_id, menu_name, slug, icon, item_index)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(category_id)
        .bind(menu_name)
        .bind(slug)
        .bind(icon)
        .bind(item_index)
        .fetch_one(pool)
        .await
    }

    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subcategory>("SELECT * FROM subcategories WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subcategory>("SELECT * FROM subcategories ORDER BY item_index, menu_name")
            .fetch_all(pool)
            .await
    }

    pub async fn list_by_category(pool: &PgPool, category_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subcategory>(
            "SELECT * FROM subcategories WHERE category_id = $1 ORDER BY item_index, menu_name",
        )
        .bind(category_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_by_categories(pool: &PgPool, category_ids: &[Uuid]) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Subcategory>(
            "SELECT * FROM subcategories WHERE category_id = ANY($1) ORDER BY item_index, menu_name",
        )
        .bind(category_ids)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str, index: i32) -> MainMenu {
        MainMenu {
            id: Uuid::new_v4(),
            menu_name: name.into(),
            slug: crate::utils::slugify(name),
            icon: None,
            item_index: index,
            is_active: true,
        }
    }

    fn category(parent: Uuid, name: &str, index: i32) -> Category {
        Category {
            id: Uuid::new_v4(),
            main_menu_id: parent,
            menu_name: name.into(),
            slug: crate::utils::slugify(name),
            icon: None,
            item_index: index,
            is_active: true,
        }
    }

    fn subcategory(parent: Uuid, name: &str) -> Subcategory {
        Subcategory {
            id: Uuid::new_v4(),
            category_id: parent,
            menu_name: name.into(),
            slug: crate::utils::slugify(name),
            icon: None,
            item_index: 0,
            is_active: true,
        }
    }

    #[test]
    fn tree_nests_and_orders_levels() {
        let electronics = section("Electronics", 1);
        let home = section("Home", 0);
        let laptops = category(electronics.id, "Laptops", 2);
        let phones = category(electronics.id, "Phones", 1);
        let gaming = subcategory(laptops.id, "Gaming Laptops");
        let orphan = subcategory(Uuid::new_v4(), "Nowhere");

        let tree = build_menu_tree(
            vec![electronics.clone(), home.clone()],
            vec![laptops.clone(), phones.clone()],
            vec![gaming.clone(), orphan],
        );

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].section.id, home.id);
        assert!(tree[0].categories.is_empty());
        let electronics_node = &tree[1];
        assert_eq!(electronics_node.categories[0].category.id, phones.id);
        assert_eq!(electronics_node.categories[1].category.id, laptops.id);
        assert_eq!(electronics_node.categories[1].subcategories[0].id, gaming.id);
    }

    #[test]
    fn lookup_serializes_with_level_tag() {
        let s = section("Audio", 0);
        let value = serde_json::to_value(MenuLookup::Section {
            tree: MenuTree {
                section: s.clone(),
                categories: vec![],
            },
        })
        .unwrap();
        assert_eq!(value["level"], "section");
        assert_eq!(value["slug"], "audio");
        assert!(value["categories"].as_array().unwrap().is_empty());
    }
}
