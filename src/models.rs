// src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Envelope around every persisted record: a generated id, creation and
/// update timestamps, and the record's own fields flattened alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document<T> {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub body: T,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<T> Document<T> {
    pub fn new(body: T) -> Self {
        let now = Utc::now();
        Document {
            id: Uuid::new_v4(),
            body,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn into_body(self) -> T {
        self.body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketCap {
    Large,
    Mid,
    Small,
}

/// One equity position. `value`, `gain_loss` and `gain_loss_percent` are
/// stored as given and never recomputed from quantity and prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    pub name: String,
    #[serde(serialize_with = "whole_number")]
    pub quantity: f64,
    #[serde(serialize_with = "whole_number")]
    pub avg_price: f64,
    #[serde(serialize_with = "whole_number")]
    pub current_price: f64,
    pub sector: String,
    pub market_cap: MarketCap,
    #[serde(serialize_with = "whole_number")]
    pub value: f64,
    #[serde(serialize_with = "whole_number")]
    pub gain_loss: f64,
    #[serde(serialize_with = "whole_number")]
    pub gain_loss_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    #[serde(serialize_with = "whole_number")]
    pub value: f64,
    #[serde(serialize_with = "whole_number")]
    pub percentage: f64,
}

/// Ordered bucket -> entry mapping. Serialized as a JSON object whose keys
/// keep insertion order, so chart slices come out in a stable order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationMap {
    entries: Vec<(String, AllocationEntry)>,
}

impl AllocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a bucket. A replaced bucket keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, entry: AllocationEntry) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((key, entry)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&AllocationEntry> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, e)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AllocationEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, AllocationEntry)> for AllocationMap {
    fn from_iter<I: IntoIterator<Item = (K, AllocationEntry)>>(iter: I) -> Self {
        let mut map = AllocationMap::new();
        for (key, entry) in iter {
            map.insert(key, entry);
        }
        map
    }
}

impl Serialize for AllocationMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

struct AllocationMapVisitor;

impl<'de> Visitor<'de> for AllocationMapVisitor {
    type Value = AllocationMap;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of bucket name to {value, percentage}")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = AllocationMap::new();
        while let Some((key, entry)) = access.next_entry::<String, AllocationEntry>()? {
            map.insert(key, entry);
        }
        Ok(map)
    }
}

impl<'de> Deserialize<'de> for AllocationMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(AllocationMapVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub by_sector: AllocationMap,
    pub by_market_cap: AllocationMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    #[serde(serialize_with = "whole_number")]
    pub portfolio: f64,
    #[serde(serialize_with = "whole_number")]
    pub nifty50: f64,
    #[serde(serialize_with = "whole_number")]
    pub gold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Horizon {
    OneMonth,
    ThreeMonths,
    OneYear,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Horizon::OneMonth, Horizon::ThreeMonths, Horizon::OneYear];

    pub fn key(self) -> &'static str {
        match self {
            Horizon::OneMonth => "1month",
            Horizon::ThreeMonths => "3months",
            Horizon::OneYear => "1year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonReturns {
    #[serde(rename = "1month")]
    #[serde(serialize_with = "whole_number")]
    pub one_month: f64,
    #[serde(rename = "3months")]
    #[serde(serialize_with = "whole_number")]
    pub three_months: f64,
    #[serde(rename = "1year")]
    #[serde(serialize_with = "whole_number")]
    pub one_year: f64,
}

impl HorizonReturns {
    pub fn get(&self, horizon: Horizon) -> f64 {
        match horizon {
            Horizon::OneMonth => self.one_month,
            Horizon::ThreeMonths => self.three_months,
            Horizon::OneYear => self.one_year,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Returns {
    pub portfolio: HorizonReturns,
    pub nifty50: HorizonReturns,
    pub gold: HorizonReturns,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub timeline: Vec<TimelinePoint>,
    pub returns: Returns,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performer {
    pub symbol: String,
    pub name: String,
    #[serde(serialize_with = "whole_number")]
    pub gain_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(serialize_with = "whole_number")]
    pub total_value: f64,
    #[serde(serialize_with = "whole_number")]
    pub total_invested: f64,
    #[serde(serialize_with = "whole_number")]
    pub total_gain_loss: f64,
    #[serde(serialize_with = "whole_number")]
    pub total_gain_loss_percent: f64,
    pub top_performer: Performer,
    pub worst_performer: Performer,
    #[serde(serialize_with = "whole_number")]
    pub diversification_score: f64,
    pub risk_level: String,
}

/// Minimal ledger entry, unrelated to the portfolio records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub title: String,
    #[serde(serialize_with = "whole_number")]
    pub amount: f64,
}

/// Writes integral values as JSON integers (`100`, not `100.0`) so stored
/// documents read back the way they were submitted.
fn whole_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() < EXACT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn allocation_map_keeps_wire_order() {
        let raw = json!({
            "Technology": { "value": 624303.75, "percentage": 32.25 },
            "Automotive": { "value": 379594.0, "percentage": 19.61 },
            "Banking": { "value": 295558.0, "percentage": 15.27 }
        });
        let map: AllocationMap = serde_json::from_value(raw).unwrap();
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Technology", "Automotive", "Banking"]);
        assert_eq!(map.get("Banking").unwrap().percentage, 15.27);

        let text = serde_json::to_string(&map).unwrap();
        assert!(text.find("Technology").unwrap() < text.find("Automotive").unwrap());
        assert!(text.find("Automotive").unwrap() < text.find("Banking").unwrap());
    }

    #[test]
    fn replacing_a_bucket_keeps_its_position() {
        let mut map = AllocationMap::new();
        map.insert("Large Cap", AllocationEntry { value: 1.0, percentage: 50.0 });
        map.insert("Mid Cap", AllocationEntry { value: 1.0, percentage: 50.0 });
        map.insert("Large Cap", AllocationEntry { value: 2.0, percentage: 66.0 });
        assert_eq!(map.len(), 2);
        assert_eq!(map.iter().next().unwrap(), ("Large Cap", &AllocationEntry { value: 2.0, percentage: 66.0 }));
    }

    #[test]
    fn document_flattens_record_fields() {
        let doc = Document::new(Transaction {
            title: "Buy".to_string(),
            amount: 100.0,
        });
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["title"], "Buy");
        assert_eq!(value["amount"].as_f64(), Some(100.0));
        assert!(value["_id"].is_string());
        assert!(value["createdAt"].is_string());
        assert!(value["updatedAt"].is_string());

        let back: Document<Transaction> = serde_json::from_value(value).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn integral_amounts_serialize_without_fraction() {
        let text = serde_json::to_string(&Transaction {
            title: "Buy".to_string(),
            amount: 100.0,
        })
        .unwrap();
        assert_eq!(text, r#"{"title":"Buy","amount":100}"#);

        let entry = serde_json::to_value(AllocationEntry { value: 2680.5, percentage: 12.0 }).unwrap();
        assert_eq!(entry, json!({ "value": 2680.5, "percentage": 12 }));
    }

    #[test]
    fn returns_use_horizon_keys() {
        let returns: HorizonReturns =
            serde_json::from_value(json!({ "1month": 2.3, "3months": 8.1, "1year": 15.7 })).unwrap();
        assert_eq!(returns.get(Horizon::ThreeMonths), 8.1);
        let keys: Vec<&str> = Horizon::ALL.iter().map(|h| h.key()).collect();
        assert_eq!(keys, vec!["1month", "3months", "1year"]);
    }

    #[test]
    fn market_cap_rejects_unknown_bucket() {
        assert!(serde_json::from_value::<MarketCap>(json!("Mega")).is_err());
        assert_eq!(serde_json::from_value::<MarketCap>(json!("Mid")).unwrap(), MarketCap::Mid);
    }
}
