// src/seed.rs
//! Sample portfolio imported by `wealth_manager seed` and `serve --seed`.
use crate::models::{
    Allocation, AllocationEntry, AllocationMap, Holding, HorizonReturns, MarketCap, Performance,
    Performer, Returns, Summary, TimelinePoint,
};
use chrono::NaiveDate;

/// Everything one seed run writes: the holdings plus the three singletons.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSeed {
    pub holdings: Vec<Holding>,
    pub allocation: Allocation,
    pub performance: Performance,
    pub summary: Summary,
}

pub fn sample_portfolio() -> PortfolioSeed {
    PortfolioSeed {
        holdings: sample_holdings(),
        allocation: sample_allocation(),
        performance: sample_performance(),
        summary: sample_summary(),
    }
}

#[allow(clippy::too_many_arguments)]
fn holding(
    symbol: &str,
    name: &str,
    quantity: f64,
    avg_price: f64,
    current_price: f64,
    sector: &str,
    value: f64,
    gain_loss: f64,
    gain_loss_percent: f64,
) -> Holding {
    Holding {
        symbol: symbol.to_string(),
        name: name.to_string(),
        quantity,
        avg_price,
        current_price,
        sector: sector.to_string(),
        market_cap: MarketCap::Large,
        value,
        gain_loss,
        gain_loss_percent,
    }
}

pub fn sample_holdings() -> Vec<Holding> {
    // SUNPHARMA's price is back-solved from its value, so its gain figures
    // are derived rather than quoted.
    let sun_price = 933.975;
    let sun_avg = 1150.0;

    vec![
        holding("RELIANCE", "Reliance Industries Ltd", 50.0, 2450.0, 2680.5, "Energy", 134025.0, 11525.0, 9.39),
        holding("INFY", "Infosys Limited", 100.0, 1800.0, 2010.75, "Technology", 201075.0, 21075.0, 11.71),
        holding("TCS", "Tata Consultan", 75.0, 3200.0, 3450.25, "Technology", 258768.8, 18768.75, 7.82),
        holding("HDFCBANK", "HDFC Bank Limited", 80.0, 1650.0, 1580.3, "Banking", 126424.0, -5576.0, -4.22),
        holding("ICICIBANK", "ICICI Bank Limited", 60.0, 1100.0, 1235.8, "Banking", 74148.0, 8148.0, 12.34),
        holding("BHARTIARTL", "Bharti Airtel Limited", 120.0, 850.0, 920.45, "Telecommunications", 110454.0, 8454.0, 8.28),
        holding("ITC", "ITC Limited", 200.0, 420.0, 465.2, "Consumer Goods", 93040.0, 9040.0, 10.76),
        holding("BAJFINANCE", "Bajaj Finance Limited", 25.0, 6800.0, 7150.6, "Financial Services", 178765.0, 8765.0, 5.15),
        holding("ASIANPAINT", "Asian Paints Limited", 40.0, 3100.0, 2890.75, "Consumer Discretionary", 115630.0, -8370.0, -6.75),
        holding("MARUTI", "Maruti Suzuki India Limited", 30.0, 9500.0, 10250.3, "Automotive", 307509.0, 22509.0, 7.90),
        holding("WIPRO", "Wipro Limited", 150.0, 450.0, 485.6, "Technology", 72840.0, 5340.0, 7.91),
        holding("TATAMOTORS", "Tata Motors Limited", 100.0, 650.0, 720.85, "Automotive", 72085.0, 7085.0, 10.90),
        holding("TECHM", "Tech Mahindra Limited", 80.0, 1200.0, 1145.3, "Technology", 91624.0, -4380.0, -4.56),
        holding("AXISBANK", "Axis Bank Limited", 90.0, 980.0, 1055.4, "Banking", 94986.0, 6786.0, 7.69),
        holding(
            "SUNPHARMA",
            "Sun Pharmaceutical Industries",
            80.0,
            sun_avg,
            sun_price,
            "Healthcare",
            74718.0,
            (sun_price - sun_avg) * 80.0,
            ((sun_price - sun_avg) / sun_avg) * 100.0,
        ),
    ]
}

fn entry(value: f64, percentage: f64) -> AllocationEntry {
    AllocationEntry { value, percentage }
}

pub fn sample_allocation() -> Allocation {
    let by_sector: AllocationMap = vec![
        ("Technology", entry(624303.75, 32.25)),
        ("Automotive", entry(379594.0, 19.61)),
        ("Banking", entry(295558.0, 15.27)),
        ("Financial Services", entry(178765.0, 9.24)),
        ("Energy", entry(134025.0, 6.92)),
        ("Consumer Discretionary", entry(115630.0, 5.97)),
        ("Telecommunications", entry(110454.0, 5.71)),
        ("Consumer Goods", entry(93040.0, 4.81)),
        ("Healthcare", entry(74718.0, 3.86)),
    ]
    .into_iter()
    .collect();

    let by_market_cap: AllocationMap = vec![
        ("Large Cap", entry(1935097.75, 100.0)),
        ("Mid Cap", entry(0.0, 0.0)),
        ("Small Cap", entry(0.0, 0.0)),
    ]
    .into_iter()
    .collect();

    Allocation {
        by_sector,
        by_market_cap,
    }
}

pub fn sample_performance() -> Performance {
    let points = [
        (1, 1500000.0, 21000.0, 62000.0),
        (2, 1520000.0, 21300.0, 61800.0),
        (3, 1540000.0, 22100.0, 64500.0),
        (4, 1580000.0, 22800.0, 66200.0),
        (5, 1620000.0, 23200.0, 68000.0),
        (6, 1650000.0, 23500.0, 68500.0),
        (7, 1680000.0, 24100.0, 69800.0),
        (8, 1720000.0, 24500.0, 70500.0),
        (9, 1750000.0, 25000.0, 71500.0),
        (10, 1780000.0, 25600.0, 72800.0),
        (11, 1820000.0, 26100.0, 74000.0),
        (12, 1850000.0, 26500.0, 75200.0),
    ];

    let timeline = points
        .iter()
        .filter_map(|&(month, portfolio, nifty50, gold)| {
            NaiveDate::from_ymd_opt(2024, month, 1).map(|date| TimelinePoint {
                date,
                portfolio,
                nifty50,
                gold,
            })
        })
        .collect();

    Performance {
        timeline,
        returns: Returns {
            portfolio: HorizonReturns { one_month: 2.3, three_months: 8.1, one_year: 15.7 },
            nifty50: HorizonReturns { one_month: 1.8, three_months: 6.2, one_year: 12.4 },
            gold: HorizonReturns { one_month: -0.5, three_months: 4.1, one_year: 8.9 },
        },
    }
}

pub fn sample_summary() -> Summary {
    Summary {
        total_value: 1935097.75,
        total_invested: 1740000.0,
        total_gain_loss: 195097.75,
        total_gain_loss_percent: 11.21,
        top_performer: Performer {
            symbol: "ICICIBANK".to_string(),
            name: "ICICI Bank Limited".to_string(),
            gain_percent: 12.34,
        },
        worst_performer: Performer {
            symbol: "ASIANPAINT".to_string(),
            name: "Asian Paints Limited".to_string(),
            gain_percent: -6.75,
        },
        diversification_score: 8.2,
        risk_level: "Moderate".to_string(),
    }
}
