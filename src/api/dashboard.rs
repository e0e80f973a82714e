use std::fmt;

use anyhow::{Result, bail};
use clap::ValueEnum;

use crate::types::date_range::DateRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DashboardReport {
    Stats,
    Revenue,
    TopDishes,
    OrderStatus,
    TableStatus,
    RecentOrders,
    Performance,
}

impl DashboardReport {
    pub fn path(self) -> &'static str {
        match self {
            Self::Stats => "/dashboard/stats",
            Self::Revenue => "/dashboard/revenue",
            Self::TopDishes => "/dashboard/top-dishes",
            Self::OrderStatus => "/dashboard/order-status",
            Self::TableStatus => "/dashboard/table-status",
            Self::RecentOrders => "/dashboard/recent-orders",
            Self::Performance => "/dashboard/performance",
        }
    }

    pub fn needs_range(self) -> bool {
        !matches!(self, Self::TableStatus | Self::RecentOrders)
    }

    fn default_limit(self) -> Option<u32> {
        match self {
            Self::TopDishes | Self::RecentOrders => Some(5),
            _ => None,
        }
    }
}

impl fmt::Display for DashboardReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path().trim_start_matches("/dashboard/"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupBy {
    Hour,
    Day,
    Week,
    Month,
}

impl GroupBy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardQuery {
    pub range: Option<DateRange>,
    pub group_by: Option<GroupBy>,
    pub limit: Option<u32>,
}

impl DashboardQuery {
    /// Query parameters for `report`. Parameters a report does not take are dropped.
    pub fn params(&self, report: DashboardReport) -> Result<Vec<(&'static str, String)>> {
        let mut params = Vec::new();

        if report.needs_range() {
            let Some(range) = &self.range else {
                bail!("{report} report needs a date range");
            };

            params.push(("startDate", range.start_param()));
            params.push(("endDate", range.end_param()));
        }

        if report == DashboardReport::Revenue {
            if let Some(group_by) = self.group_by {
                params.push(("groupBy", group_by.as_str().to_string()));
            }
        }

        if let Some(default_limit) = report.default_limit() {
            let limit = self.limit.unwrap_or(default_limit);
            if limit == 0 {
                bail!("limit must be > 0");
            }

            params.push(("limit", limit.to_string()));
        }

        Ok(params)
    }
}
