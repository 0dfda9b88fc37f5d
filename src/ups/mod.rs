//! UPS status source: the seam between the decision logic and the wire.
//!
//! The monitor and the drain controller only ever ask two questions of a
//! UPS: is it on mains, and how many seconds of battery remain. Any failure
//! to answer is surfaced as an error; nothing here retries or degrades.

pub mod snmp;

use async_trait::async_trait;

use crate::error::PowerResult;
use crate::models::{BatteryMargin, UpsAppliance, UpsReading};

/// Answers status queries for a single UPS address.
#[async_trait]
pub trait UpsStatusSource: Send + Sync {
    /// `true` on mains, `false` on battery.
    async fn is_on_mains(&self, appliance: &UpsAppliance) -> PowerResult<bool>;

    /// Estimated seconds of battery left.
    async fn battery_seconds_remaining(&self, appliance: &UpsAppliance) -> PowerResult<u64>;
}

/// Poll one appliance. Battery time is only queried while on battery.
pub async fn read_appliance(
    source: &dyn UpsStatusSource,
    appliance: &UpsAppliance,
) -> PowerResult<UpsReading> {
    let on_mains = source.is_on_mains(appliance).await?;
    let seconds_remaining = if on_mains {
        None
    } else {
        Some(source.battery_seconds_remaining(appliance).await?)
    };

    Ok(UpsReading {
        appliance: appliance.clone(),
        on_mains,
        seconds_remaining,
    })
}

/// Remaining battery time of every appliance, in configuration order.
pub async fn battery_margin(
    source: &dyn UpsStatusSource,
    appliances: &[UpsAppliance],
) -> PowerResult<BatteryMargin> {
    let mut seconds = Vec::with_capacity(appliances.len());
    for appliance in appliances {
        let remaining = source.battery_seconds_remaining(appliance).await?;
        seconds.push((appliance.clone(), remaining));
    }
    Ok(BatteryMargin { seconds })
}
