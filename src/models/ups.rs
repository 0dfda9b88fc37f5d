use std::fmt;

/// One physical UPS, identified by its network address.
/// Supplied by configuration and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpsAppliance {
    pub address: String,
}

impl UpsAppliance {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl fmt::Display for UpsAppliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Result of polling one appliance at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsReading {
    pub appliance: UpsAppliance,
    pub on_mains: bool,
    /// Only queried while the unit is on battery.
    pub seconds_remaining: Option<u64>,
}

/// Aggregate of one polling cycle over every configured appliance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetBatteryState {
    /// Number of appliances polled this cycle.
    pub total: usize,
    /// Appliances reporting battery power.
    pub on_battery: Vec<UpsAppliance>,
    /// Lowest remaining time among appliances on battery.
    pub min_seconds_remaining: Option<u64>,
}

impl FleetBatteryState {
    /// Build the fleet view from a full set of readings.
    pub fn from_readings(readings: &[UpsReading]) -> Self {
        let on_battery: Vec<UpsAppliance> = readings
            .iter()
            .filter(|r| !r.on_mains)
            .map(|r| r.appliance.clone())
            .collect();
        let min_seconds_remaining = readings
            .iter()
            .filter(|r| !r.on_mains)
            .filter_map(|r| r.seconds_remaining)
            .min();

        Self {
            total: readings.len(),
            on_battery,
            min_seconds_remaining,
        }
    }

    pub fn count_on_battery(&self) -> usize {
        self.on_battery.len()
    }

    /// Every polled appliance is on battery. An empty fleet never qualifies.
    pub fn is_unanimous(&self) -> bool {
        self.total > 0 && self.on_battery.len() == self.total
    }

    /// Some, but not all, appliances are on battery.
    pub fn is_degraded(&self) -> bool {
        !self.on_battery.is_empty() && self.on_battery.len() < self.total
    }
}

/// Remaining battery seconds for every appliance, taken in one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatteryMargin {
    pub seconds: Vec<(UpsAppliance, u64)>,
}

impl BatteryMargin {
    /// True when every appliance is strictly below `threshold_secs`.
    /// An empty sweep is never critical.
    pub fn all_below(&self, threshold_secs: u64) -> bool {
        !self.seconds.is_empty() && self.seconds.iter().all(|(_, s)| *s < threshold_secs)
    }

    pub fn min(&self) -> Option<u64> {
        self.seconds.iter().map(|(_, s)| *s).min()
    }
}
