use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DailyStats {
    pub date: String,
    pub count: usize,
    pub revenue: i64,
    pub service_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyStats {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub total_appointments: usize,
    pub total_revenue: i64,
    pub no_show_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OverallStats {
    pub total_appointments: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub cancelled: usize,
    pub no_show: usize,
    pub total_revenue: i64,
}
