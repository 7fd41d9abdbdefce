/// Ordered feature names per predictor.
/// The order is the contract with every trained artifact: the schema
/// fingerprint stored alongside a model is derived from these lists, so any
/// change here makes previously trained artifacts unloadable.
pub const CREATIVE_FATIGUE_FEATURES: &[&str] = &[
    "ctr_trend",
    "cpm_trend",
    "engagement_trend",
    "frequency_avg",
    "days_running",
    "impressions_total",
    "spend_total",
    "platform_factor",
    "creative_type_factor",
    "audience_size",
];

pub const BUDGET_FEATURES: &[&str] = &[
    "current_spend",
    "current_revenue",
    "current_roi",
    "efficiency_score",
    "roi_trend",
    "seasonality",
    "platform_performance",
    "data_points",
    "spend_variance",
    "roi_variance",
];

pub const CUSTOMER_FEATURES: &[&str] = &[
    "recency_days",
    "frequency",
    "monetary",
    "avg_order_value",
    "avg_days_between",
    "std_days_between",
    "month_variety",
    "recent_purchases",
    "recent_amount",
    "recent_trend",
    "email_opens_30d",
    "website_visits_30d",
    "product_views_30d",
    "cart_abandonment_rate",
];

pub const VELOCITY_FEATURES: &[&str] = &[
    "current_velocity",
    "recent_trend",
    "velocity_variance",
    "seasonal_factor",
    "lifecycle_position",
    "inventory_pressure",
    "price_position",
    "competitive_products",
    "category_seasonality",
    "trend_sensitivity",
    "search_volume_change",
    "social_mentions_change",
    "competitor_price_change",
    "market_demand_change",
];

pub const MERCHANT_PROFILE_FEATURES: &[&str] = &[
    "monthly_orders",
    "avg_order_value",
    "profit_margin",
    "conversion_rate",
    "customer_retention",
    "roas",
    "lifetime_value",
];

/// Fingerprint of an ordered feature list, stored in every artifact.
pub fn schema_fingerprint(predictor: &str, features: &[&str]) -> String {
    format!("{}/v1:{}", predictor, features.join(","))
}
