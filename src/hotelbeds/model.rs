//! Typed views over the content API's JSON records.
//!
//! Every field is optional at this layer; the loaders decide which ones are
//! mandatory. Codes that upstream sometimes sends as numbers are read as text.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `{"content": "...", "languageCode": "ENG"}` wrapper used for names, descriptions, etc.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub content: Option<String>,
}

/// `outer.content`, or `None` when either level is absent.
pub fn content_of(outer: &Option<Content>) -> Option<&str> {
    outer.as_ref().and_then(|c| c.content.as_deref())
}

/// Flat hotel attributes shared by every layout. Nested collections are not
/// touched, so a wide load never fails on their shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelSummary {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    pub name: Option<Content>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub accommodation_type_code: Option<String>,
    pub city: Option<Content>,
    pub address: Option<Content>,
    pub email: Option<String>,
    pub web: Option<String>,
    pub last_update: Option<String>,
    #[serde(rename = "S2C")]
    pub s2c: Option<String>,
    pub ranking: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelRecord {
    #[serde(flatten)]
    pub summary: HotelSummary,
    pub description: Option<Content>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub state_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub destination_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub zone_code: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub facilities: Option<Vec<HotelFacility>>,
    pub rooms: Option<Vec<Room>>,
    pub phones: Option<Vec<Phone>>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub board_codes: Option<Vec<String>>,
    pub images: Option<Vec<Image>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Coordinates {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotelFacility {
    pub facility_code: Option<i64>,
    pub facility_group_code: Option<i64>,
    pub number: Option<i64>,
    pub voucher: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    #[serde(default, deserialize_with = "lenient_string")]
    pub room_code: Option<String>,
    pub room_type: Option<String>,
    pub characteristic_code: Option<String>,
    pub min_pax: Option<i64>,
    pub max_pax: Option<i64>,
    pub min_adults: Option<i64>,
    pub max_adults: Option<i64>,
    pub max_children: Option<i64>,
    pub is_parent_room: Option<bool>,
    pub room_facilities: Option<Vec<RoomFacility>>,
    pub room_stays: Option<Vec<RoomStay>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomFacility {
    pub facility_code: Option<i64>,
    pub facility_group_code: Option<i64>,
    pub ind_logic: Option<bool>,
    pub number: Option<i64>,
    pub voucher: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStay {
    pub stay_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order: Option<String>,
    pub description: Option<String>,
    pub room_stay_facilities: Option<Vec<StayFacility>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayFacility {
    pub facility_code: Option<i64>,
    pub facility_group_code: Option<i64>,
    pub number: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phone {
    pub phone_number: Option<String>,
    pub phone_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub image_type_code: Option<String>,
    pub path: Option<String>,
    pub order: Option<i64>,
    pub visual_order: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub room_code: Option<String>,
    pub room_type: Option<String>,
    pub characteristic_code: Option<String>,
}

/// One entry of the `/types/facilities` catalogue.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityType {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    pub facility_group_code: Option<i64>,
    pub facility_typology_code: Option<i64>,
    pub description: Option<Content>,
}

fn scalar_to_string(v: Value) -> Result<Option<String>, String> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(format!("expected string or number, got {other}")),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(v) => scalar_to_string(v).map_err(serde::de::Error::custom),
    }
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
    let Some(items) = raw else {
        return Ok(None);
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if let Some(s) = scalar_to_string(item).map_err(serde::de::Error::custom)? {
            out.push(s);
        }
    }
    Ok(Some(out))
}
