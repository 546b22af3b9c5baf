//! 确定性的示例数据仓库，结构与真实仓库查询保持一致

use async_trait::async_trait;
use chrono::{Datelike, Duration, Months, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};

use crate::error::WorkflowError;
use crate::warehouse::DatasetProvider;
use crate::warehouse::catalog::{DatasetCall, DatasetFunction};

const PRODUCTS: [&str; 14] = [
    "Ultra Blender X",
    "Pro Espresso Machine",
    "Premium Chef Knife Set",
    "Standard Toaster",
    "Lite Kettle",
    "Pro Stand Mixer",
    "Premium Cookware Bundle",
    "Ultra Air Fryer",
    "Standard Rice Cooker",
    "Lite Hand Blender",
    "Pro Food Processor",
    "Premium Cast Iron Skillet",
    "Standard Cutting Board",
    "Ultra Sous Vide Cooker",
];

const CATEGORIES: [&str; 6] = ["Pro", "Premium", "Standard", "Lite", "Ultra", "Other"];

const FIRST_NAMES: [&str; 8] = [
    "Avery", "Jordan", "Morgan", "Riley", "Casey", "Quinn", "Harper", "Rowan",
];
const LAST_NAMES: [&str; 8] = [
    "Nguyen", "Patel", "Garcia", "Kim", "Okafor", "Schmidt", "Rossi", "Silva",
];

/// 按种子生成的电商示例数据
#[derive(Debug, Clone)]
pub struct SampleWarehouse {
    seed: u64,
    reference_date: NaiveDate,
}

impl SampleWarehouse {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            reference_date: Utc::now().date_naive(),
        }
    }

    /// 固定"今天"的日期，保证输出完全可复现
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = date;
        self
    }

    fn rng_for(&self, function: DatasetFunction) -> StdRng {
        let salt = DatasetFunction::ALL
            .iter()
            .position(|f| *f == function)
            .unwrap_or_default() as u64;
        StdRng::seed_from_u64(self.seed.wrapping_mul(31).wrapping_add(salt))
    }

    /// 生成数据集结果
    pub fn generate(&self, call: &DatasetCall) -> Value {
        let argument = call
            .argument
            .or_else(|| call.function.parameter().map(|p| p.default_value()))
            .unwrap_or_default();

        match call.function {
            DatasetFunction::SalesMetrics => self.sales_metrics(argument),
            DatasetFunction::SalesTrend => json!({ "sales_trend": self.daily_rows(argument) }),
            DatasetFunction::TopProducts => self.top_products(argument as usize),
            DatasetFunction::CustomerSegments => self.customer_segments(),
            DatasetFunction::RevenueByCategory => self.revenue_by_category(),
            DatasetFunction::MonthlyComparison => self.monthly_comparison(argument),
            DatasetFunction::CustomerLifetimeValue => {
                self.customer_lifetime_value(argument as usize)
            }
        }
    }

    /// 每日销售行，sales_trend 与 sales_metrics 共用同一份序列
    fn daily_rows(&self, days: u32) -> Vec<Value> {
        let mut rng = self.rng_for(DatasetFunction::SalesTrend);
        let start = self.reference_date - Duration::days(days.saturating_sub(1) as i64);

        (0..days)
            .map(|offset| {
                let date = start + Duration::days(offset as i64);
                let weekend_boost = if date.weekday().number_from_monday() >= 6 {
                    1.25
                } else {
                    1.0
                };
                let orders = (rng.random_range(18u32..42) as f64 * weekend_boost) as u32;
                let basket: f64 = rng.random_range(45.0..95.0);
                json!({
                    "date": date.format("%Y-%m-%d").to_string(),
                    "revenue": round2(orders as f64 * basket),
                    "orders": orders,
                })
            })
            .collect()
    }

    fn sales_metrics(&self, days: u32) -> Value {
        let rows = self.daily_rows(days);
        let total_orders: u64 = rows.iter().filter_map(|r| r["orders"].as_u64()).sum();
        let total_revenue: f64 = rows.iter().filter_map(|r| r["revenue"].as_f64()).sum();
        let avg_order_value = if total_orders > 0 {
            total_revenue / total_orders as f64
        } else {
            0.0
        };
        let mut rng = self.rng_for(DatasetFunction::SalesMetrics);
        let repeat_ratio: f64 = rng.random_range(0.55..0.8);

        json!({
            "period_days": days,
            "total_orders": total_orders,
            "total_revenue": round2(total_revenue),
            "avg_order_value": round2(avg_order_value),
            "unique_customers": (total_orders as f64 * repeat_ratio).round() as u64,
        })
    }

    fn top_products(&self, limit: usize) -> Value {
        let mut rng = self.rng_for(DatasetFunction::TopProducts);
        let mut products: Vec<Value> = PRODUCTS
            .iter()
            .map(|name| {
                let total_sold: u32 = rng.random_range(40..600);
                let unit_price: f64 = rng.random_range(19.0..320.0);
                json!({
                    "product_name": name,
                    "total_sold": total_sold,
                    "total_revenue": round2(total_sold as f64 * unit_price),
                    "orders_count": (total_sold as f64 * rng.random_range(0.7..0.95)) as u32,
                })
            })
            .collect();
        sort_desc_by(&mut products, "total_revenue");
        products.truncate(limit);

        json!({ "top_products": products })
    }

    fn customer_segments(&self) -> Value {
        let mut rng = self.rng_for(DatasetFunction::CustomerSegments);
        let segments = [
            ("High Value", 80_000.0..140_000.0),
            ("Mid Value", 50_000.0..80_000.0),
            ("Low Value", 22_000.0..50_000.0),
        ];
        let rows: Vec<Value> = segments
            .into_iter()
            .map(|(segment, income)| {
                json!({
                    "segment": segment,
                    "customer_count": rng.random_range(120..900),
                    "avg_income": round2(rng.random_range(income)),
                })
            })
            .collect();

        json!({ "customer_segments": rows })
    }

    fn revenue_by_category(&self) -> Value {
        let mut rng = self.rng_for(DatasetFunction::RevenueByCategory);
        let mut rows: Vec<Value> = CATEGORIES
            .iter()
            .map(|category| {
                json!({
                    "category": category,
                    "revenue": round2(rng.random_range(8_000.0..95_000.0)),
                    "orders": rng.random_range(60..1_200),
                })
            })
            .collect();
        sort_desc_by(&mut rows, "revenue");

        json!({ "revenue_by_category": rows })
    }

    fn monthly_comparison(&self, months: u32) -> Value {
        let mut rng = self.rng_for(DatasetFunction::MonthlyComparison);
        let first_of_month = self
            .reference_date
            .with_day(1)
            .unwrap_or(self.reference_date);

        let rows: Vec<Value> = (0..months)
            .rev()
            .filter_map(|back| first_of_month.checked_sub_months(Months::new(back)))
            .map(|month| {
                let orders: u32 = rng.random_range(600..1_400);
                let avg_order_value: f64 = rng.random_range(48.0..88.0);
                json!({
                    "month": month.format("%Y-%m").to_string(),
                    "revenue": round2(orders as f64 * avg_order_value),
                    "orders": orders,
                    "avg_order_value": round2(avg_order_value),
                })
            })
            .collect();

        json!({ "monthly_comparison": rows })
    }

    fn customer_lifetime_value(&self, limit: usize) -> Value {
        let mut rng = self.rng_for(DatasetFunction::CustomerLifetimeValue);
        let mut customers: Vec<Value> = (0..limit.max(1) + 10)
            .map(|i| {
                let total_orders: u32 = rng.random_range(2..40);
                let avg_order_value: f64 = rng.random_range(35.0..240.0);
                json!({
                    "customer_id": 1_000 + i as u64,
                    "customer_name": format!(
                        "{} {}",
                        FIRST_NAMES[i % FIRST_NAMES.len()],
                        LAST_NAMES[(i / FIRST_NAMES.len() + i) % LAST_NAMES.len()]
                    ),
                    "total_orders": total_orders,
                    "lifetime_value": round2(total_orders as f64 * avg_order_value),
                    "avg_order_value": round2(avg_order_value),
                })
            })
            .collect();
        sort_desc_by(&mut customers, "lifetime_value");
        customers.truncate(limit);

        json!({ "top_customers": customers })
    }
}

impl Default for SampleWarehouse {
    fn default() -> Self {
        Self::new(42)
    }
}

#[async_trait]
impl DatasetProvider for SampleWarehouse {
    async fn call(&self, call: &DatasetCall) -> Result<Value, WorkflowError> {
        Ok(self.generate(call))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sort_desc_by(rows: &mut [Value], field: &str) {
    rows.sort_by(|a, b| {
        let a = a[field].as_f64().unwrap_or_default();
        let b = b[field].as_f64().unwrap_or_default();
        b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
    });
}
