// src/dashboard.rs
//! View derivations for the dashboard. Everything here is a pure function of
//! the fetched data and is recomputed on every render.
use crate::client::DashboardData;
use crate::models::{AllocationMap, Holding, Horizon, Performance, Returns, Summary};
use std::cmp::Ordering;
use std::fmt::{self, Write};
use std::str::FromStr;

pub const SECTOR_COLORS: [&str; 6] = ["#0088FE", "#00C49F", "#FFBB28", "#FF8042", "#AF19FF", "#FF0054"];
pub const MARKET_CAP_COLORS: [&str; 3] = ["#8884d8", "#82ca9d", "#ffc658"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Symbol,
    Name,
    Sector,
    Quantity,
    AvgPrice,
    CurrentPrice,
    Value,
    GainLoss,
    GainLossPercent,
}

enum SortKey<'a> {
    Text(&'a str),
    Number(f64),
}

impl SortColumn {
    fn key(self, holding: &Holding) -> SortKey<'_> {
        match self {
            SortColumn::Symbol => SortKey::Text(&holding.symbol),
            SortColumn::Name => SortKey::Text(&holding.name),
            SortColumn::Sector => SortKey::Text(&holding.sector),
            SortColumn::Quantity => SortKey::Number(holding.quantity),
            SortColumn::AvgPrice => SortKey::Number(holding.avg_price),
            SortColumn::CurrentPrice => SortKey::Number(holding.current_price),
            SortColumn::Value => SortKey::Number(holding.value),
            SortColumn::GainLoss => SortKey::Number(holding.gain_loss),
            SortColumn::GainLossPercent => SortKey::Number(holding.gain_loss_percent),
        }
    }

    fn compare(self, a: &Holding, b: &Holding) -> Ordering {
        match (self.key(a), self.key(b)) {
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(&b),
            _ => Ordering::Equal,
        }
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "symbol" => Ok(SortColumn::Symbol),
            "name" => Ok(SortColumn::Name),
            "sector" => Ok(SortColumn::Sector),
            "quantity" => Ok(SortColumn::Quantity),
            "avgprice" => Ok(SortColumn::AvgPrice),
            "currentprice" => Ok(SortColumn::CurrentPrice),
            "value" => Ok(SortColumn::Value),
            "gainloss" => Ok(SortColumn::GainLoss),
            "gainlosspercent" => Ok(SortColumn::GainLossPercent),
            _ => Err(format!("unknown column `{}`", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Search and sort state of the holdings table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoldingsTable {
    search: String,
    sort: Option<(SortColumn, SortDirection)>,
}

impl HoldingsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_search(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn sort(&self) -> Option<(SortColumn, SortDirection)> {
        self.sort
    }

    /// Selecting the sorted column again flips direction; any other column
    /// starts ascending.
    pub fn select_column(&mut self, column: SortColumn) {
        self.sort = match self.sort {
            Some((current, SortDirection::Ascending)) if current == column => {
                Some((column, SortDirection::Descending))
            }
            Some((current, SortDirection::Descending)) if current == column => {
                Some((column, SortDirection::Ascending))
            }
            _ => Some((column, SortDirection::Ascending)),
        };
    }

    pub fn sort_indicator(&self, column: SortColumn) -> &'static str {
        match self.sort {
            Some((current, SortDirection::Ascending)) if current == column => " ▲",
            Some((current, SortDirection::Descending)) if current == column => " ▼",
            _ => "",
        }
    }

    /// Holdings whose name or symbol contains the search term (ignoring
    /// case), in insertion order unless a column is selected. Descending is
    /// the exact reverse of ascending, ties included.
    pub fn rows<'a>(&self, holdings: &'a [Holding]) -> Vec<&'a Holding> {
        let term = self.search.to_lowercase();
        let mut rows: Vec<&Holding> = holdings
            .iter()
            .filter(|h| {
                h.name.to_lowercase().contains(&term) || h.symbol.to_lowercase().contains(&term)
            })
            .collect();

        if let Some((column, direction)) = self.sort {
            rows.sort_by(|a, b| column.compare(a, b));
            if direction == SortDirection::Descending {
                rows.reverse();
            }
        }
        rows
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub name: String,
    pub value: f64,
    pub percentage: f64,
    pub color: &'static str,
}

/// One slice per bucket in map order; colours cycle through `palette`.
pub fn pie_slices(map: &AllocationMap, palette: &[&'static str]) -> Vec<PieSlice> {
    map.iter()
        .enumerate()
        .map(|(i, (name, entry))| PieSlice {
            name: name.to_string(),
            value: entry.value,
            percentage: entry.percentage,
            color: palette
                .get(i % palette.len().max(1))
                .copied()
                .unwrap_or(MARKET_CAP_COLORS[0]),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: &'static str,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    pub labels: Vec<String>,
    pub series: Vec<Series>,
}

pub fn line_chart(performance: &Performance) -> LineChart {
    let timeline = &performance.timeline;
    LineChart {
        labels: timeline.iter().map(|p| p.date.format("%b %Y").to_string()).collect(),
        series: vec![
            Series {
                name: "Portfolio Value",
                values: timeline.iter().map(|p| p.portfolio).collect(),
            },
            Series {
                name: "Nifty 50",
                values: timeline.iter().map(|p| p.nifty50).collect(),
            },
            Series {
                name: "Gold",
                values: timeline.iter().map(|p| p.gold).collect(),
            },
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Gain,
    Loss,
}

impl Tone {
    pub fn of(value: f64) -> Tone {
        if value >= 0.0 {
            Tone::Gain
        } else {
            Tone::Loss
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnFigure {
    pub series: &'static str,
    pub percent: f64,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnsCard {
    pub horizon: Horizon,
    pub figures: Vec<ReturnFigure>,
}

pub fn returns_cards(returns: &Returns) -> Vec<ReturnsCard> {
    Horizon::ALL
        .iter()
        .map(|&horizon| ReturnsCard {
            horizon,
            figures: [
                ("Portfolio", &returns.portfolio),
                ("Nifty 50", &returns.nifty50),
                ("Gold", &returns.gold),
            ]
            .into_iter()
            .map(|(series, figures)| {
                let percent = figures.get(horizon);
                ReturnFigure {
                    series,
                    percent,
                    tone: Tone::of(percent),
                }
            })
            .collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub title: &'static str,
    pub display: String,
    pub tone: Option<Tone>,
}

pub fn overview_cards(summary: &Summary, holdings_count: usize) -> Vec<Card> {
    vec![
        Card {
            title: "Total Portfolio Value",
            display: format!("₹{}", format_inr(summary.total_value)),
            tone: None,
        },
        Card {
            title: "Total Gain/Loss",
            display: signed_inr(summary.total_gain_loss),
            tone: Some(Tone::of(summary.total_gain_loss)),
        },
        Card {
            title: "Performance % (Total)",
            display: format!("{:+.2}%", summary.total_gain_loss_percent),
            tone: Some(Tone::of(summary.total_gain_loss_percent)),
        },
        Card {
            title: "Number of Holdings",
            display: holdings_count.to_string(),
            tone: None,
        },
    ]
}

pub fn insights(summary: &Summary) -> Vec<Card> {
    let top = &summary.top_performer;
    let worst = &summary.worst_performer;
    vec![
        Card {
            title: "Best Performing Stock",
            display: format!("{} ({}) {:+.1}%", top.name, top.symbol, top.gain_percent),
            tone: Some(Tone::Gain),
        },
        Card {
            title: "Worst Performing Stock",
            display: format!("{} ({}) {:+.1}%", worst.name, worst.symbol, worst.gain_percent),
            tone: Some(Tone::Loss),
        },
        Card {
            title: "Diversification Score",
            display: format!("{:.1}/10", summary.diversification_score),
            tone: None,
        },
        Card {
            title: "Risk Level",
            display: summary.risk_level.clone(),
            tone: None,
        },
    ]
}

/// Formats with Indian digit grouping (`19,35,097.75`) and at most three
/// fraction digits, trailing zeros dropped.
pub fn format_inr(amount: f64) -> String {
    let fixed = format!("{:.3}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac = frac_part.trim_end_matches('0');
    let negative = amount < 0.0 && (!int_part.trim_start_matches('0').is_empty() || !frac.is_empty());

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&group_indian(int_part));
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 || !digits.is_ascii() {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (front, pair) = rest.split_at(rest.len() - 2);
        groups.push(pair);
        rest = front;
    }
    groups.push(rest);
    groups.reverse();
    format!("{},{}", groups.join(","), tail)
}

fn signed_inr(amount: f64) -> String {
    if amount >= 0.0 {
        format!("+₹{}", format_inr(amount))
    } else {
        format!("-₹{}", format_inr(-amount))
    }
}

/// Plain-text rendering of the whole dashboard.
pub fn render(data: &DashboardData, table: &HoldingsTable) -> Result<String, fmt::Error> {
    let mut out = String::new();
    write_dashboard(&mut out, data, table)?;
    Ok(out)
}

fn write_dashboard(out: &mut String, data: &DashboardData, table: &HoldingsTable) -> fmt::Result {
    writeln!(out, "WealthManager Dashboard")?;
    writeln!(out, "=======================")?;
    writeln!(out)?;

    for card in overview_cards(&data.summary, data.holdings.len()) {
        writeln!(out, "{:<24} {}", card.title, card.display)?;
    }

    writeln!(out, "\nAsset Allocation")?;
    for (title, map, palette) in [
        ("By Sector", &data.allocation.by_sector, &SECTOR_COLORS[..]),
        ("By Market Cap", &data.allocation.by_market_cap, &MARKET_CAP_COLORS[..]),
    ] {
        writeln!(out, "  {}", title)?;
        for slice in pie_slices(map, palette) {
            writeln!(
                out,
                "    {:<24} ₹{:>14} {:>6.1}%",
                slice.name,
                format_inr(slice.value),
                slice.percentage
            )?;
        }
    }

    writeln!(out, "\nPerformance Comparison")?;
    let chart = line_chart(&data.performance);
    write!(out, "  {:<10}", "")?;
    for series in &chart.series {
        write!(out, " {:>16}", series.name)?;
    }
    writeln!(out)?;
    for (i, label) in chart.labels.iter().enumerate() {
        write!(out, "  {:<10}", label)?;
        for series in &chart.series {
            write!(out, " {:>16}", format_inr(series.values[i]))?;
        }
        writeln!(out)?;
    }

    writeln!(out, "\nReturns Comparison")?;
    for card in returns_cards(&data.performance.returns) {
        write!(out, "  {:<8}", card.horizon.key().to_uppercase())?;
        for figure in &card.figures {
            write!(out, " {:>7} ({})", format!("{:+.1}%", figure.percent), figure.series)?;
        }
        writeln!(out)?;
    }

    writeln!(out, "\nPortfolio Holdings")?;
    if !table.search().is_empty() {
        writeln!(out, "  search: {:?}", table.search())?;
    }
    writeln!(
        out,
        "  {:<14}{:<32}{:>8}{:>12}{:>14}{:>16}{:>14}{:>10}",
        format!("Symbol{}", table.sort_indicator(SortColumn::Symbol)),
        format!("Name{}", table.sort_indicator(SortColumn::Name)),
        "Qty",
        "Avg.",
        "Current",
        format!("Value{}", table.sort_indicator(SortColumn::Value)),
        format!("G/L{}", table.sort_indicator(SortColumn::GainLoss)),
        format!("G/L %{}", table.sort_indicator(SortColumn::GainLossPercent)),
    )?;
    let rows = table.rows(&data.holdings);
    if rows.is_empty() {
        writeln!(out, "  No holdings data available.")?;
    }
    for h in rows {
        writeln!(
            out,
            "  {:<14}{:<32}{:>8}{:>12}{:>14}{:>16}{:>14}{:>10}",
            h.symbol,
            h.name,
            h.quantity,
            format_inr(h.avg_price),
            format_inr(h.current_price),
            format_inr(h.value),
            signed_inr(h.gain_loss),
            format!("{:+.2}%", h.gain_loss_percent),
        )?;
    }

    writeln!(out, "\nTop Performers & Insights")?;
    for card in insights(&data.summary) {
        writeln!(out, "  {:<24} {}", card.title, card.display)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{sample_allocation, sample_holdings, sample_performance, sample_portfolio};

    fn symbols(rows: &[&Holding]) -> Vec<String> {
        rows.iter().map(|h| h.symbol.clone()).collect()
    }

    #[test]
    fn unsorted_table_keeps_insertion_order() {
        let holdings = sample_holdings();
        let table = HoldingsTable::new();
        let rows = table.rows(&holdings);
        assert_eq!(rows.len(), 15);
        assert_eq!(rows[0].symbol, "RELIANCE");
        assert_eq!(rows[14].symbol, "SUNPHARMA");
    }

    #[test]
    fn filter_matches_symbol_or_name_ignoring_case() {
        let holdings = sample_holdings();
        let mut table = HoldingsTable::new();

        table.set_search("BANK");
        assert_eq!(symbols(&table.rows(&holdings)), vec!["HDFCBANK", "ICICIBANK", "AXISBANK"]);

        table.set_search("limited");
        let rows = table.rows(&holdings);
        assert!(rows.iter().all(|h| h.name.to_lowercase().contains("limited")));
        assert!(!rows.is_empty());

        table.set_search("tata");
        assert_eq!(symbols(&table.rows(&holdings)), vec!["TCS", "TATAMOTORS"]);

        table.set_search("zzz");
        assert!(table.rows(&holdings).is_empty());
    }

    #[test]
    fn numeric_sort_and_toggle() {
        let holdings = sample_holdings();
        let mut table = HoldingsTable::new();
        table.select_column(SortColumn::Value);
        let ascending = symbols(&table.rows(&holdings));
        assert_eq!(ascending.first().unwrap(), "TATAMOTORS");
        assert_eq!(ascending.last().unwrap(), "MARUTI");

        table.select_column(SortColumn::Value);
        assert_eq!(table.sort(), Some((SortColumn::Value, SortDirection::Descending)));
        let mut descending = symbols(&table.rows(&holdings));
        descending.reverse();
        assert_eq!(descending, ascending);

        table.select_column(SortColumn::Value);
        assert_eq!(table.sort(), Some((SortColumn::Value, SortDirection::Ascending)));
    }

    #[test]
    fn descending_reverses_ties_too() {
        let mut holdings = sample_holdings();
        holdings.truncate(3);
        for h in holdings.iter_mut() {
            h.sector = "Same".to_string();
        }
        let mut table = HoldingsTable::new();
        table.select_column(SortColumn::Sector);
        assert_eq!(symbols(&table.rows(&holdings)), vec!["RELIANCE", "INFY", "TCS"]);
        table.select_column(SortColumn::Sector);
        assert_eq!(symbols(&table.rows(&holdings)), vec!["TCS", "INFY", "RELIANCE"]);
    }

    #[test]
    fn string_sort_is_lexicographic_and_new_column_resets() {
        let holdings = sample_holdings();
        let mut table = HoldingsTable::new();
        table.select_column(SortColumn::Symbol);
        table.select_column(SortColumn::Symbol);
        table.select_column(SortColumn::Name);
        assert_eq!(table.sort(), Some((SortColumn::Name, SortDirection::Ascending)));
        assert_eq!(table.sort_indicator(SortColumn::Name), " ▲");
        assert_eq!(table.sort_indicator(SortColumn::Symbol), "");

        table.set_search("bank");
        table.select_column(SortColumn::Symbol);
        assert_eq!(symbols(&table.rows(&holdings)), vec!["AXISBANK", "HDFCBANK", "ICICIBANK"]);
    }

    #[test]
    fn parses_column_names() {
        assert_eq!("gainLossPercent".parse::<SortColumn>(), Ok(SortColumn::GainLossPercent));
        assert_eq!("avg_price".parse::<SortColumn>(), Ok(SortColumn::AvgPrice));
        assert_eq!("VALUE".parse::<SortColumn>(), Ok(SortColumn::Value));
        assert!("colour".parse::<SortColumn>().is_err());
    }

    #[test]
    fn pie_slices_follow_allocation_order() {
        let allocation = sample_allocation();
        let slices = pie_slices(&allocation.by_sector, &SECTOR_COLORS);
        assert_eq!(slices.len(), 9);
        assert_eq!(slices[0].name, "Technology");
        assert_eq!(slices[0].value, 624303.75);
        assert_eq!(slices[0].percentage, 32.25);
        assert_eq!(slices[0].color, "#0088FE");
        assert_eq!(slices[6].color, "#0088FE");

        let caps = pie_slices(&allocation.by_market_cap, &MARKET_CAP_COLORS);
        let names: Vec<&str> = caps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Large Cap", "Mid Cap", "Small Cap"]);
    }

    #[test]
    fn line_chart_shares_the_date_axis() {
        let chart = line_chart(&sample_performance());
        assert_eq!(chart.labels.len(), 12);
        assert_eq!(chart.labels[0], "Jan 2024");
        assert_eq!(chart.labels[11], "Dec 2024");
        assert_eq!(chart.series.len(), 3);
        assert!(chart.series.iter().all(|s| s.values.len() == 12));
        assert_eq!(chart.series[1].values[0], 21000.0);
    }

    #[test]
    fn returns_cards_color_by_sign() {
        let cards = returns_cards(&sample_performance().returns);
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].horizon, Horizon::OneMonth);
        let gold = &cards[0].figures[2];
        assert_eq!(gold.series, "Gold");
        assert_eq!(gold.percent, -0.5);
        assert_eq!(gold.tone, Tone::Loss);
        assert_eq!(cards[2].figures[0].percent, 15.7);
        assert_eq!(cards[2].figures[0].tone, Tone::Gain);
        assert_eq!(Tone::of(0.0), Tone::Gain);
    }

    #[test]
    fn indian_grouping() {
        assert_eq!(format_inr(134025.0), "1,34,025");
        assert_eq!(format_inr(1935097.75), "19,35,097.75");
        assert_eq!(format_inr(258768.8), "2,58,768.8");
        assert_eq!(format_inr(999.0), "999");
        assert_eq!(format_inr(-5576.0), "-5,576");
        assert_eq!(format_inr(0.0), "0");
        assert_eq!(format_inr(-0.0001), "0");
        assert_eq!(format_inr(933.975), "933.975");
    }

    #[test]
    fn overview_and_insight_cards() {
        let summary = sample_portfolio().summary;
        let cards = overview_cards(&summary, 15);
        assert_eq!(cards[0].display, "₹19,35,097.75");
        assert_eq!(cards[1].display, "+₹1,95,097.75");
        assert_eq!(cards[2].display, "+11.21%");
        assert_eq!(cards[3].display, "15");

        let insights = insights(&summary);
        assert_eq!(insights[0].display, "ICICI Bank Limited (ICICIBANK) +12.3%");
        assert_eq!(insights[2].display, "8.2/10");
        assert_eq!(insights[3].display, "Moderate");
    }

    #[test]
    fn render_includes_every_section() {
        let seed = sample_portfolio();
        let data = DashboardData {
            holdings: seed.holdings,
            allocation: seed.allocation,
            performance: seed.performance,
            summary: seed.summary,
        };
        let mut table = HoldingsTable::new();
        table.set_search("reliance");
        let text = render(&data, &table).unwrap();
        for heading in [
            "Asset Allocation",
            "Performance Comparison",
            "Returns Comparison",
            "Portfolio Holdings",
            "Top Performers & Insights",
        ] {
            assert!(text.contains(heading), "missing {}", heading);
        }
        assert!(text.contains("Reliance Industries Ltd"));
        assert!(!text.contains("Infosys Limited"));
    }
}
