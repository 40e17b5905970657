//! Record ordering options.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::models::MediaRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOption {
    /// Newest capture first; records without a capture date use their
    /// import date
    #[default]
    DateTaken,
    /// Newest import first
    DateImported,
    /// Natural, case-insensitive file name order
    FileName,
    /// Highest rating first, then newest capture
    Rating,
}

impl SortOption {
    pub const ALL: [SortOption; 4] = [
        SortOption::DateTaken,
        SortOption::DateImported,
        SortOption::FileName,
        SortOption::Rating,
    ];

    pub fn compare(self, lhs: &MediaRecord, rhs: &MediaRecord) -> Ordering {
        let primary = match self {
            SortOption::DateTaken => rhs.effective_date().cmp(&lhs.effective_date()),
            SortOption::DateImported => rhs.date_imported.cmp(&lhs.date_imported),
            SortOption::FileName => natural_cmp(&lhs.file_name, &rhs.file_name),
            SortOption::Rating => rhs
                .rating
                .cmp(&lhs.rating)
                .then_with(|| rhs.effective_date().cmp(&lhs.effective_date())),
        };
        // Ties fall back to the id so the order is total and stable.
        primary.then_with(|| lhs.id.to_string().cmp(&rhs.id.to_string()))
    }
}

/// Sorts `records` in place by `option`.
pub fn sort_records(records: &mut [MediaRecord], option: SortOption) {
    records.sort_by(|lhs, rhs| option.compare(lhs, rhs));
}

/// Case-insensitive comparison that orders digit runs numerically, so
/// `IMG_2` sorts before `IMG_10`.
pub fn natural_cmp(lhs: &str, rhs: &str) -> Ordering {
    let mut left = lhs.chars().peekable();
    let mut right = rhs.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_digits = take_digits(&mut left);
                let r_digits = take_digits(&mut right);
                let ordering = compare_digit_runs(&l_digits, &r_digits);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        digits.push(c);
        chars.next();
    }
    digits
}

fn compare_digit_runs(lhs: &str, rhs: &str) -> Ordering {
    let lhs = lhs.trim_start_matches('0');
    let rhs = rhs.trim_start_matches('0');
    lhs.len().cmp(&rhs.len()).then_with(|| lhs.cmp(rhs))
}
