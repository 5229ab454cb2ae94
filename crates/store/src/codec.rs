//! Enum <-> TEXT column conversions. Kept local to the store crate rather
//! than added to `kairos-core`, since nothing outside persistence needs an
//! enum parsed back out of a string.

use kairos_core::{Asset, Season, ScheduleStatus, Side, TwapOrderStatus};

use crate::sqlite::DecodeError;

pub fn asset_to_str(asset: Asset) -> &'static str {
    match asset {
        Asset::Btc => "BTC",
        Asset::Eth => "ETH",
        Asset::Xrp => "XRP",
        Asset::Sol => "SOL",
        Asset::Krw => "KRW",
    }
}

pub fn asset_from_str(s: &str) -> Result<Asset, DecodeError> {
    match s {
        "BTC" => Ok(Asset::Btc),
        "ETH" => Ok(Asset::Eth),
        "XRP" => Ok(Asset::Xrp),
        "SOL" => Ok(Asset::Sol),
        "KRW" => Ok(Asset::Krw),
        other => Err(DecodeError(format!("unknown asset {other}"))),
    }
}

pub fn side_to_str(side: Side) -> &'static str {
    match side {
        Side::Buy => "Buy",
        Side::Sell => "Sell",
    }
}

pub fn side_from_str(s: &str) -> Result<Side, DecodeError> {
    match s {
        "Buy" => Ok(Side::Buy),
        "Sell" => Ok(Side::Sell),
        other => Err(DecodeError(format!("unknown side {other}"))),
    }
}

pub fn season_to_str(season: Season) -> &'static str {
    match season {
        Season::RiskOn => "RiskOn",
        Season::RiskOff => "RiskOff",
        Season::Neutral => "Neutral",
    }
}

pub fn season_from_str(s: &str) -> Result<Season, DecodeError> {
    match s {
        "RiskOn" => Ok(Season::RiskOn),
        "RiskOff" => Ok(Season::RiskOff),
        "Neutral" => Ok(Season::Neutral),
        other => Err(DecodeError(format!("unknown season {other}"))),
    }
}

pub fn schedule_status_to_str(status: ScheduleStatus) -> &'static str {
    match status {
        ScheduleStatus::Active => "Active",
        ScheduleStatus::Completed => "Completed",
        ScheduleStatus::Cancelled => "Cancelled",
        ScheduleStatus::Failed => "Failed",
    }
}

pub fn schedule_status_from_str(s: &str) -> Result<ScheduleStatus, DecodeError> {
    match s {
        "Active" => Ok(ScheduleStatus::Active),
        "Completed" => Ok(ScheduleStatus::Completed),
        "Cancelled" => Ok(ScheduleStatus::Cancelled),
        "Failed" => Ok(ScheduleStatus::Failed),
        other => Err(DecodeError(format!("unknown schedule status {other}"))),
    }
}

pub fn order_status_to_str(status: TwapOrderStatus) -> &'static str {
    match status {
        TwapOrderStatus::Pending => "Pending",
        TwapOrderStatus::Executing => "Executing",
        TwapOrderStatus::Completed => "Completed",
        TwapOrderStatus::Failed => "Failed",
        TwapOrderStatus::Cancelled => "Cancelled",
    }
}

pub fn order_status_from_str(s: &str) -> Result<TwapOrderStatus, DecodeError> {
    match s {
        "Pending" => Ok(TwapOrderStatus::Pending),
        "Executing" => Ok(TwapOrderStatus::Executing),
        "Completed" => Ok(TwapOrderStatus::Completed),
        "Failed" => Ok(TwapOrderStatus::Failed),
        "Cancelled" => Ok(TwapOrderStatus::Cancelled),
        other => Err(DecodeError(format!("unknown order status {other}"))),
    }
}
