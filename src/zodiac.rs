use std::fmt;
use std::str::FromStr;

use anyhow::Context as _;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::cli::ZodiacArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

/// `(sign, (start month, start day), (end month, end day))`, both ends inclusive.
const RANGES: [(ZodiacSign, (u32, u32), (u32, u32)); 12] = [
    (ZodiacSign::Aries, (3, 21), (4, 19)),
    (ZodiacSign::Taurus, (4, 20), (5, 20)),
    (ZodiacSign::Gemini, (5, 21), (6, 20)),
    (ZodiacSign::Cancer, (6, 21), (7, 22)),
    (ZodiacSign::Leo, (7, 23), (8, 22)),
    (ZodiacSign::Virgo, (8, 23), (9, 22)),
    (ZodiacSign::Libra, (9, 23), (10, 22)),
    (ZodiacSign::Scorpio, (10, 23), (11, 21)),
    (ZodiacSign::Sagittarius, (11, 22), (12, 21)),
    (ZodiacSign::Capricorn, (12, 22), (1, 19)),
    (ZodiacSign::Aquarius, (1, 20), (2, 18)),
    (ZodiacSign::Pisces, (2, 19), (3, 20)),
];

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];

    /// Sign for a calendar date; the year is ignored.
    ///
    /// Total over every valid date. Falls back to Pisces if no range matches.
    #[must_use]
    pub fn from_date(date: impl Datelike) -> Self {
        let (month, day) = (date.month(), date.day());
        RANGES
            .iter()
            .find(|(_, start, end)| {
                (month == start.0 && day >= start.1) || (month == end.0 && day <= end.1)
            })
            .map(|(sign, _, _)| *sign)
            .unwrap_or(ZodiacSign::Pisces)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ZodiacSign::Aries => "Aries",
            ZodiacSign::Taurus => "Taurus",
            ZodiacSign::Gemini => "Gemini",
            ZodiacSign::Cancer => "Cancer",
            ZodiacSign::Leo => "Leo",
            ZodiacSign::Virgo => "Virgo",
            ZodiacSign::Libra => "Libra",
            ZodiacSign::Scorpio => "Scorpio",
            ZodiacSign::Sagittarius => "Sagittarius",
            ZodiacSign::Capricorn => "Capricorn",
            ZodiacSign::Aquarius => "Aquarius",
            ZodiacSign::Pisces => "Pisces",
        }
    }
}

impl fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZodiacSign {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        ZodiacSign::ALL
            .into_iter()
            .find(|sign| sign.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| anyhow::anyhow!("unknown zodiac sign: {s}"))
    }
}

pub fn run(args: ZodiacArgs) -> anyhow::Result<()> {
    let date = NaiveDate::parse_from_str(args.date.trim(), "%Y-%m-%d")
        .with_context(|| format!("parse --date (expected YYYY-MM-DD): {}", args.date))?;
    println!("{}", ZodiacSign::from_date(date));
    Ok(())
}
