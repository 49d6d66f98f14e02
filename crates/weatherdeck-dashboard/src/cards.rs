//! Forecast cards: one per tracked city, created once and then only replaced
//! by strictly fresher data.

use std::io::Write;

use chrono::{Datelike, Local, Weekday};
use weatherdeck_weather::{Forecast, WeatherCondition};

/// What [`CardSet::apply`] did with a forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardChange {
    Created,
    Updated,
    /// Not newer than what the card already shows
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastCard {
    pub key: String,
    pub label: String,
    pub forecast: Forecast,
}

impl ForecastCard {
    fn new(forecast: Forecast) -> Self {
        Self {
            key: forecast.key.clone(),
            label: forecast.label.clone(),
            forecast,
        }
    }
}

/// Cards in the order they were first created.
#[derive(Debug, Default)]
pub struct CardSet {
    cards: Vec<ForecastCard>,
}

impl CardSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `forecast` on its city's card.
    ///
    /// Creates the card on first delivery. Later deliveries replace the card
    /// contents only when their `created` timestamp is strictly newer.
    pub fn apply(&mut self, forecast: Forecast) -> CardChange {
        match self.cards.iter_mut().find(|c| c.key == forecast.key) {
            Some(card) if forecast.is_fresher_than(&card.forecast) => {
                card.label = forecast.label.clone();
                card.forecast = forecast;
                CardChange::Updated
            }
            Some(_) => CardChange::Ignored,
            None => {
                self.cards.push(ForecastCard::new(forecast));
                CardChange::Created
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ForecastCard> {
        self.cards.iter().find(|c| c.key == key)
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.cards.len();
        self.cards.retain(|c| c.key != key);
        self.cards.len() != before
    }

    pub fn keys(&self) -> Vec<&str> {
        self.cards.iter().map(|c| c.key.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForecastCard> {
        self.cards.iter()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// View collaborator driven by the dashboard.
pub trait CardRenderer {
    fn render(&mut self, change: CardChange, card: &ForecastCard);

    fn remove(&mut self, key: &str);
}

/// Label for the `offset`-th forecast day, counting from `today`.
pub fn day_label(today: Weekday, offset: usize) -> String {
    let mut day = today;
    for _ in 0..offset % 7 {
        day = day.succ();
    }
    day.to_string()
}

fn icon(code: i32) -> &'static str {
    WeatherCondition::from_yahoo_code(code).map_or("-", |c| c.icon_class())
}

/// Writes cards as plain text.
pub struct TerminalRenderer<W: Write> {
    out: W,
    today: Weekday,
}

impl TerminalRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            today: Local::now().weekday(),
        }
    }

    /// Fix the weekday the forecast rows are labelled from.
    pub fn with_today(mut self, today: Weekday) -> Self {
        self.today = today;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_card(&mut self, change: CardChange, card: &ForecastCard) -> std::io::Result<()> {
        let f = &card.forecast;
        let c = &f.current;
        let marker = match change {
            CardChange::Updated => " (updated)",
            _ => "",
        };

        writeln!(self.out, "{}{}  [{:?}]", card.label, marker, f.source)?;
        writeln!(self.out, "  {}", c.date)?;
        writeln!(
            self.out,
            "  {} [{}]  {}°C",
            c.description,
            icon(c.code),
            c.temperature.round()
        )?;
        writeln!(
            self.out,
            "  Sunrise {}  Sunset {}  Humidity {}%  Wind {} {}°",
            c.sunrise,
            c.sunset,
            c.humidity.round(),
            c.wind_speed.round(),
            c.wind_direction
        )?;
        for (i, day) in f.days.iter().enumerate() {
            writeln!(
                self.out,
                "  {}  {:<20} {:>4}° {:>4}°",
                day_label(self.today, i),
                icon(day.code),
                day.high.round(),
                day.low.round()
            )?;
        }
        writeln!(self.out)?;
        self.out.flush()
    }
}

impl<W: Write> CardRenderer for TerminalRenderer<W> {
    fn render(&mut self, change: CardChange, card: &ForecastCard) {
        if let Err(e) = self.write_card(change, card) {
            tracing::warn!("Failed to render card {}: {}", card.key, e);
        }
    }

    fn remove(&mut self, key: &str) {
        if let Err(e) = writeln!(self.out, "Removed {}", key) {
            tracing::warn!("Failed to render removal of {}: {}", key, e);
        }
    }
}
