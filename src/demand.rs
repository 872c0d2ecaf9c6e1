use std::ops::Add;

/// How many more values a subscriber is willing to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Demand {
    Unlimited,
    Max(usize),
}

impl Demand {
    pub const NONE: Demand = Demand::Max(0);

    pub fn max(n: usize) -> Self {
        Demand::Max(n)
    }

    pub fn unlimited() -> Self {
        Demand::Unlimited
    }

    pub fn is_none(&self) -> bool {
        *self == Demand::NONE
    }
}

impl Default for Demand {
    fn default() -> Self {
        Demand::NONE
    }
}

impl Add for Demand {
    type Output = Demand;

    fn add(self, rhs: Demand) -> Demand {
        match (self, rhs) {
            (Demand::Max(a), Demand::Max(b)) => match a.checked_add(b) {
                Some(n) => Demand::Max(n),
                None => Demand::Unlimited,
            },
            _ => Demand::Unlimited,
        }
    }
}
