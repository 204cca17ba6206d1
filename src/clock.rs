// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Time source for history timestamps and accounting periods.
//!
//! The accounting period is the local calendar day of [`Clock::today`].
//!
//! # Example
//!
//! ```
//! use chrono::{NaiveDate, TimeDelta};
//! use retail_ledger::{Clock, ManualClock};
//!
//! let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(23, 0, 0).unwrap();
//! let clock = ManualClock::new(start);
//! clock.advance(TimeDelta::hours(2));
//! assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
//! ```

use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

pub trait Clock: Send + Sync + fmt::Debug {
    /// Current local wall time.
    fn now(&self) -> NaiveDateTime;

    /// Day of the current accounting period.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Clock handle shared between an account and its history.
pub type SharedClock = Arc<dyn Clock>;

/// Wall clock in the local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn shared() -> SharedClock {
        Arc::new(SystemClock)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: NaiveDateTime) {
        *self.now.lock() = at;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    #[test]
    fn manual_clock_holds_still() {
        let clock = ManualClock::new(at(10, 9));
        assert_eq!(clock.now(), at(10, 9));
        assert_eq!(clock.now(), at(10, 9));
    }

    #[test]
    fn manual_clock_advances_across_midnight() {
        let clock = ManualClock::new(at(10, 23));
        clock.advance(TimeDelta::hours(1));
        assert_eq!(clock.now(), at(11, 0));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 11).unwrap());
    }

    #[test]
    fn manual_clock_can_be_set() {
        let clock = ManualClock::new(at(10, 9));
        clock.set(at(20, 12));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2025, 1, 20).unwrap());
    }

    #[test]
    fn shared_manual_clock_is_observed_through_trait_object() {
        let clock = Arc::new(ManualClock::new(at(1, 8)));
        let shared: SharedClock = clock.clone();
        clock.advance(TimeDelta::days(1));
        assert_eq!(shared.now(), at(2, 8));
    }
}
