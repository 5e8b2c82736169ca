use serde::{Deserialize, Serialize};

use crate::error::{WgpError, WgpResult};

/// Table limit for a single hole, in quarters. Carry-ins are capped at it and
/// escalations past it are refused, so a round's totals always fit in `i32`.
pub const MAX_WAGER: u32 = 1 << 20;

/// Stake for a single hole, in quarters. The value only ever doubles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wager {
    base: u32,
    carry_in: u32,
    multiplier: u32,
    doubled: bool,
    floated: bool,
}

impl Wager {
    pub fn new(base: u32, carry_in: u32) -> Self {
        let base = base.clamp(1, MAX_WAGER);
        let capped = carry_in.min(MAX_WAGER - base);
        if capped < carry_in {
            log::warn!("carry of {} quarters capped at {}", carry_in, capped);
        }
        Wager {
            base,
            carry_in: capped,
            multiplier: 1,
            doubled: false,
            floated: false,
        }
    }

    pub fn current(&self) -> u32 {
        self.base
            .saturating_add(self.carry_in)
            .saturating_mul(self.multiplier)
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn carry_in(&self) -> u32 {
        self.carry_in
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn is_doubled(&self) -> bool {
        self.doubled
    }

    pub fn is_floated(&self) -> bool {
        self.floated
    }

    /// Whether one more doubling stays within the table limit.
    pub fn can_double(&self) -> bool {
        self.doubled_multiplier().is_some()
    }

    fn doubled_multiplier(&self) -> Option<u32> {
        let multiplier = self.multiplier.checked_mul(2)?;
        let stake = self.base.checked_add(self.carry_in)?.checked_mul(multiplier)?;
        (stake <= MAX_WAGER).then_some(multiplier)
    }

    fn double(&mut self) -> WgpResult<()> {
        match self.doubled_multiplier() {
            Some(multiplier) => {
                self.multiplier = multiplier;
                Ok(())
            }
            None => Err(WgpError::PreconditionNotMet(format!(
                "doubling {} quarters would pass the {} quarter table limit",
                self.current(),
                MAX_WAGER
            ))),
        }
    }

    pub(crate) fn double_for_solo(&mut self) -> WgpResult<()> {
        self.double()
    }

    pub(crate) fn apply_accepted_double(&mut self) -> WgpResult<()> {
        self.double()?;
        self.doubled = true;
        Ok(())
    }

    pub(crate) fn apply_float(&mut self) -> WgpResult<()> {
        self.double()?;
        self.floated = true;
        Ok(())
    }
}
