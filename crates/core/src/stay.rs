use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{Package, StayDates};

/// Check-in/check-out selection of one booking session.
///
/// Every edit keeps `{check_in, check_out, nights, package}` consistent with
/// the package minimum-stay rules. Violations are reported through `error` as
/// advisory text and never block further editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaySelection {
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub nights: i64,
    pub package: Package,
    pub error: Option<String>,
}

impl Default for StaySelection {
    fn default() -> Self {
        Self {
            check_in: None,
            check_out: None,
            nights: 0,
            package: Package::Standard,
            error: None,
        }
    }
}

impl StaySelection {
    pub fn new(package: Package) -> Self {
        Self {
            package,
            ..Self::default()
        }
    }

    pub fn on_check_in_changed(&mut self, check_in: NaiveDate) {
        self.check_in = Some(check_in);

        match self.check_out {
            None => {
                let min_stay = self.package.min_nights();
                self.check_out = Some(add_nights(check_in, min_stay));
                self.nights = min_stay;
                self.error = None;
            }
            Some(check_out) => self.validate(check_in, check_out),
        }
    }

    pub fn on_check_out_changed(&mut self, check_out: NaiveDate) {
        self.check_out = Some(check_out);
        if let Some(check_in) = self.check_in {
            self.validate(check_in, check_out);
        }
    }

    /// Recomputes nights and checks the minimum stay. A Premium selection that
    /// falls short is downgraded to Standard rather than having its dates
    /// extended.
    pub fn validate(&mut self, check_in: NaiveDate, check_out: NaiveDate) {
        self.nights = nights_between(check_in, check_out);

        if self.nights >= self.package.min_nights() {
            self.error = None;
            return;
        }

        self.error = Some(minimum_stay_message(self.package));

        if self.package == Package::Premium && self.nights < Package::Premium.min_nights() {
            self.package = Package::Standard;
            self.error = if self.nights >= Package::Standard.min_nights() {
                None
            } else {
                Some(minimum_stay_message(Package::Standard))
            };
        }
    }

    /// Returns false when the selection was rejected. Unlike [`validate`],
    /// an accepted package with too few nights extends the checkout date.
    ///
    /// [`validate`]: StaySelection::validate
    pub fn on_package_selected(&mut self, package: Package) -> bool {
        if package == Package::Premium && self.nights < Package::Premium.min_nights() {
            return false;
        }

        self.package = package;

        if let (Some(check_in), Some(check_out)) = (self.check_in, self.check_out) {
            if nights_between(check_in, check_out) < package.min_nights() {
                self.check_out = Some(add_nights(check_in, package.min_nights()));
                self.nights = package.min_nights();
                self.error = None;
            }
        }

        true
    }

    pub fn dates(&self) -> Option<StayDates> {
        Some(StayDates {
            check_in: self.check_in?,
            check_out: self.check_out?,
        })
    }

    /// Total price in USD; zero until both dates are chosen.
    pub fn total_cost(&self) -> u64 {
        if self.dates().is_none() {
            return 0;
        }
        self.nights.max(0) as u64 * u64::from(self.package.rate())
    }
}

pub fn nights_between(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days()
}

pub fn minimum_stay_message(package: Package) -> String {
    format!(
        "{} requires a minimum of {} nights.",
        package.display_name(),
        package.min_nights()
    )
}

fn add_nights(date: NaiveDate, nights: i64) -> NaiveDate {
    date.checked_add_days(Days::new(nights.max(0) as u64))
        .unwrap_or(date)
}
