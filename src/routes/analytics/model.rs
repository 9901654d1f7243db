use chrono::{Datelike, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::utils::{discount_percentage, round_money};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Subcategories shown by name before the rest collapse into "Others".
pub const TOP_CATEGORIES: usize = 6;

const ORDER_LINES: &str = r#"
    FROM orders o
    CROSS JOIN LATERAL jsonb_to_recordset(o.order_items)
        AS li(product_id UUID, quantity INT, price NUMERIC)
    JOIN products p ON p.id = li.product_id
    JOIN subcategories s ON s.id = p.subcategory_id
"#;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PeriodCount {
    pub period: i32,
    pub total_orders: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthSummary {
    pub month: &'static str,
    pub total_orders: i64,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub id: usize,
    pub label: String,
    pub amount: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub selling_price: Decimal,
    pub actual_price: Decimal,
    #[sqlx(skip)]
    pub discount: Decimal,
    pub subcategory_id: Uuid,
    pub subcategory_name: String,
    pub total_quantity_sold: i64,
    pub total_revenue: Decimal,
    pub order_count: i64,
}

impl TopProduct {
    fn with_discount(mut self) -> Self {
        self.discount = discount_percentage(self.actual_price, self.selling_price, 2);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SubcategoryTop {
    pub subcategory_id: Uuid,
    pub subcategory_name: String,
    pub products: Vec<TopProduct>,
}

/// Twelve months of the year, zero-filled where no orders exist.
pub fn fill_months(rows: &[(i32, i64, Decimal)]) -> Vec<MonthSummary> {
    MONTH_NAMES
        .iter()
        .enumerate()
        .map(|(i, month)| {
            let found = rows.iter().find(|(m, _, _)| *m == i as i32 + 1);
            MonthSummary {
                month: *month,
                total_orders: found.map_or(0, |r| r.1),
                total_amount: found.map_or(Decimal::ZERO, |r| r.2),
            }
        })
        .collect()
}

/// Top subcategories by revenue plus an "Others" bucket that is always present.
/// Percentages have one decimal and the last bucket absorbs rounding so the sum is exactly 100.
pub fn category_share(mut rows: Vec<(String, Decimal)>) -> Vec<CategoryShare> {
    rows.retain(|(_, amount)| *amount > Decimal::ZERO);
    rows.sort_by(|a, b| b.1.cmp(&a.1));

    let total: Decimal = rows.iter().map(|(_, amount)| *amount).sum();
    let others: Decimal = rows.iter().skip(TOP_CATEGORIES).map(|(_, amount)| *amount).sum();
    let percent = |amount: Decimal| {
        if total > Decimal::ZERO {
            round_money(amount / total * Decimal::ONE_HUNDRED, 1)
        } else {
            Decimal::ZERO
        }
    };

    let mut shares: Vec<CategoryShare> = rows
        .into_iter()
        .take(TOP_CATEGORIES)
        .enumerate()
        .map(|(id, (label, amount))| CategoryShare {
            id,
            label,
            amount,
            value: percent(amount),
        })
        .collect();

    let assigned: Decimal = shares.iter().map(|s| s.value).sum();
    shares.push(CategoryShare {
        id: TOP_CATEGORIES,
        label: "Others".to_string(),
        amount: others,
        value: Decimal::ONE_HUNDRED - assigned,
    });
    shares
}

/// Rows must arrive sorted by subcategory name, then quantity descending.
pub fn group_by_subcategory(rows: Vec<TopProduct>, per_subcategory: usize) -> Vec<SubcategoryTop> {
    let mut groups: Vec<SubcategoryTop> = Vec::new();
    for row in rows {
        let row = row.with_discount();
        match groups.last_mut() {
            Some(group) if group.subcategory_id == row.subcategory_id => {
                if group.products.len() < per_subcategory {
                    group.products.push(row);
                }
            }
            _ => groups.push(SubcategoryTop {
                subcategory_id: row.subcategory_id,
                subcategory_name: row.subcategory_name.clone(),
                products: vec![row],
            }),
        }
    }
    groups
}

pub async fn total_revenue(pool: &PgPool) -> Result<Decimal, sqlx::Error> {
    sqlx::query_scalar::<_, Decimal>("SELECT COALESCE(SUM(total_price), 0) FROM orders")
        .fetch_one(pool)
        .await
}

pub async fn orders_by_month(pool: &PgPool) -> Result<Vec<PeriodCount>, sqlx::Error> {
    sqlx::query_as::<_, PeriodCount>(
        r#"
        SELECT EXTRACT(MONTH FROM created_at)::INT AS period, COUNT(*) AS total_orders
        FROM orders GROUP BY 1 ORDER BY 1
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn orders_by_day(pool: &PgPool) -> Result<Vec<PeriodCount>, sqlx::Error> {
    sqlx::query_as::<_, PeriodCount>(
        r#"
        SELECT EXTRACT(DAY FROM created_at)::INT AS period, COUNT(*) AS total_orders
        FROM orders GROUP BY 1 ORDER BY 1
        "#,
    )
    .fetch_all(pool)
    .await
}

pub async fn current_year(pool: &PgPool) -> Result<Vec<MonthSummary>, sqlx::Error> {
    let year = Utc::now().year();
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single();
    let end = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single();

    let rows = sqlx::query_as::<_, (i32, i64, Decimal)>(
        r#"
        SELECT EXTRACT(MONTH FROM created_at)::INT, COUNT(*), COALESCE(SUM(total_price), 0)
        FROM orders
        WHERE created_at >= $1 AND created_at < $2
        GROUP BY 1
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(fill_months(&rows))
}

pub async fn revenue_by_subcategory(pool: &PgPool) -> Result<Vec<(String, Decimal)>, sqlx::Error> {
    sqlx::query_as::<_, (String, Decimal)>(&format!(
        "SELECT s.menu_name, SUM(li.quantity * li.price) {ORDER_LINES} GROUP BY s.id, s.menu_name"
    ))
    .fetch_all(pool)
    .await
}

const TOP_PRODUCT_COLUMNS: &str = r#"
    SELECT p.id AS product_id, p.name, p.images[1] AS image,
           p.selling_price, p.actual_price,
           s.id AS subcategory_id, s.menu_name AS subcategory_name,
           SUM(li.quantity)::BIGINT AS total_quantity_sold,
           SUM(li.quantity * li.price) AS total_revenue,
           COUNT(DISTINCT o.id) AS order_count
"#;

pub async fn top_selling(pool: &PgPool, limit: i64) -> Result<Vec<TopProduct>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TopProduct>(&format!(
        "{TOP_PRODUCT_COLUMNS} {ORDER_LINES} GROUP BY p.id, s.id \
         ORDER BY total_quantity_sold DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(TopProduct::with_discount).collect())
}

pub async fn top_selling_by_subcategory(
    pool: &PgPool,
    per_subcategory: usize,
) -> Result<Vec<SubcategoryTop>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TopProduct>(&format!(
        "{TOP_PRODUCT_COLUMNS} {ORDER_LINES} GROUP BY p.id, s.id \
         ORDER BY s.menu_name, s.id, total_quantity_sold DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(group_by_subcategory(rows, per_subcategory))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    fn total(shares: &[CategoryShare]) -> Decimal {
        shares.iter().map(|s| s.value).sum()
    }

    #[test]
    fn shares_sum_to_exactly_one_hundred() {
        let rows = vec![
            ("Laptops".to_string(), d(1)),
            ("Phones".to_string(), d(1)),
            ("Tablets".to_string(), d(1)),
        ];
        let shares = category_share(rows);
        assert_eq!(shares.len(), 4);
        assert_eq!(total(&shares), Decimal::ONE_HUNDRED);
        assert_eq!(shares[0].value, Decimal::new(333, 1));
        assert_eq!(shares[3].label, "Others");
    }

    #[test]
    fn tail_collapses_into_others() {
        let rows: Vec<(String, Decimal)> = (1..=9).map(|i| (format!("Sub {i}"), d(i))).collect();
        let shares = category_share(rows);
        assert_eq!(shares.len(), TOP_CATEGORIES + 1);
        assert_eq!(shares[0].label, "Sub 9");
        let others = shares.last().unwrap();
        assert_eq!(others.amount, d(1 + 2 + 3));
        assert_eq!(total(&shares), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn no_sales_gives_others_everything() {
        let shares = category_share(vec![("Idle".to_string(), Decimal::ZERO)]);
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].label, "Others");
        assert_eq!(shares[0].value, Decimal::ONE_HUNDRED);
    }

    #[test]
    fn year_is_zero_filled() {
        let months = fill_months(&[(3, 4, d(200)), (12, 1, d(10))]);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0].total_orders, 0);
        assert_eq!(months[2].month, "Mar");
        assert_eq!(months[2].total_amount, d(200));
        assert_eq!(months[11].total_orders, 1);
    }

    fn top(subcategory: Uuid, name: &str, sold: i64) -> TopProduct {
        TopProduct {
            product_id: Uuid::new_v4(),
            name: name.to_string(),
            image: None,
            selling_price: d(75),
            actual_price: d(100),
            discount: Decimal::ZERO,
            subcategory_id: subcategory,
            subcategory_name: "Audio".to_string(),
            total_quantity_sold: sold,
            total_revenue: d(75 * sold),
            order_count: 1,
        }
    }

    #[test]
    fn subcategory_groups_are_capped() {
        let audio = Uuid::new_v4();
        let video = Uuid::new_v4();
        let rows = vec![
            top(audio, "A", 9),
            top(audio, "B", 5),
            top(audio, "C", 1),
            top(video, "D", 3),
        ];
        let groups = group_by_subcategory(rows, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].products.len(), 2);
        assert_eq!(groups[0].products[0].name, "A");
        assert_eq!(groups[0].products[0].discount, Decimal::new(2500, 2));
        assert_eq!(groups[1].products.len(), 1);
    }
}
