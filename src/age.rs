use chrono::{Datelike, Local, NaiveDate};

/// Age reported when the birth date is missing or not in the past.
pub const UNKNOWN_AGE: i32 = -1;

/// Residents at or under this age are children.
pub const CHILD_AGE_THRESHOLD: i32 = 18;

/// Source of "today" for age derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Clock::System => Local::now().date_naive(),
            Clock::Fixed(date) => *date,
        }
    }

    pub fn age(&self, birth_date: Option<NaiveDate>) -> i32 {
        age_on(birth_date, self.today())
    }
}

/// Completed years between `birth_date` and `today`, or [`UNKNOWN_AGE`].
pub fn age_on(birth_date: Option<NaiveDate>, today: NaiveDate) -> i32 {
    let Some(birth) = birth_date else {
        return UNKNOWN_AGE;
    };
    if birth >= today {
        return UNKNOWN_AGE;
    }

    let mut years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    years
}

pub fn is_valid(age: i32) -> bool {
    age >= 0
}

pub fn is_child(age: i32) -> bool {
    is_valid(age) && age <= CHILD_AGE_THRESHOLD
}

pub fn is_adult(age: i32) -> bool {
    age > CHILD_AGE_THRESHOLD
}
