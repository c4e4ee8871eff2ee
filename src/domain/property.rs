// src/domain/property.rs

use serde::ser::SerializeStruct;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::warn;

/// Whether a property is actively listed or was identified independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListingType {
    OnMarket,
    OffMarket,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::OnMarket => "on-market",
            ListingType::OffMarket => "off-market",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "on-market" => Some(ListingType::OnMarket),
            "off-market" => Some(ListingType::OffMarket),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    /// Two-letter code, upper-cased.
    pub state: Option<String>,
    pub zip_code: Option<String>,
}

impl Address {
    /// "street, city, state, zip" with the missing parts left out.
    pub fn one_line(&self) -> String {
        [&self.street, &self.city, &self.state, &self.zip_code]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    /// Returns `None` for pairs that cannot be placed on a map.
    pub fn new(longitude: f64, latitude: f64) -> Option<Self> {
        let valid = longitude.is_finite()
            && latitude.is_finite()
            && (-180.0..=180.0).contains(&longitude)
            && (-90.0..=90.0).contains(&latitude);
        valid.then_some(Self {
            longitude,
            latitude,
        })
    }
}

// Serialized as a GeoJSON point, the shape the map client already consumes.
impl Serialize for Coordinates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut point = serializer.serialize_struct("Point", 2)?;
        point.serialize_field("type", "Point")?;
        point.serialize_field("coordinates", &[self.longitude, self.latitude])?;
        point.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterAccess {
    pub has_municipal_water: bool,
    pub has_well: bool,
    pub has_water_rights: bool,
    pub water_issues: BTreeSet<String>,
}

impl WaterAccess {
    /// Neither municipal water nor a well.
    pub fn has_no_water(&self) -> bool {
        !self.has_municipal_water && !self.has_well
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WastewaterAccess {
    pub has_municipal_sewer: bool,
    pub has_septic: bool,
    pub wastewater_issues: BTreeSet<String>,
}

impl WastewaterAccess {
    /// Neither municipal sewer nor septic.
    pub fn has_no_wastewater(&self) -> bool {
        !self.has_municipal_sewer && !self.has_septic
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyDetails {
    #[serde(deserialize_with = "lenient")]
    pub acres: Option<f64>,
    #[serde(deserialize_with = "lenient_text")]
    pub zoning: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub current_use: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub potential_use: Option<String>,
    #[serde(deserialize_with = "lenient_vec")]
    pub improvements: Vec<String>,
}

/// A property in canonical shape. Every field the predicates read is defined.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: String,
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    pub listing_type: ListingType,
    pub price: f64,
    pub water_access: WaterAccess,
    pub wastewater_access: WastewaterAccess,
    pub environmental_issues: BTreeSet<String>,
    pub approved: bool,

    // Descriptive fields, carried through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_details: Option<PropertyDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl PropertyRecord {
    pub fn has_no_water(&self) -> bool {
        self.water_access.has_no_water()
    }

    pub fn has_no_wastewater(&self) -> bool {
        self.wastewater_access.has_no_wastewater()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedReason {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid listing type `{0}`")]
    InvalidListingType(String),

    #[error("price must be a non-negative number, got {0}")]
    InvalidPrice(f64),

    #[error("unreadable document: {0}")]
    Unreadable(String),
}

/// A raw document that could not be normalized. Reported next to the valid
/// output; it never aborts a batch.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed record {}: {reason}", .id.as_deref().unwrap_or("<no id>"))]
pub struct MalformedRecordError {
    /// Position in the input batch, when normalized as part of one.
    pub index: Option<usize>,
    pub id: Option<String>,
    pub reason: MalformedReason,
}

/// Output of [`normalize_all`]: the valid records, in input order, and one
/// error per skipped document.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub records: Vec<PropertyRecord>,
    pub errors: Vec<MalformedRecordError>,
}

// prop
//  ├── id | _id (string, number or {"$oid": ...})
//  ├── address { street, city, state, zipCode }
//  ├── coordinates ({type, coordinates: [lon, lat]} | [lon, lat] | {lat, lng})
//  ├── listingType, price, approved
//  ├── waterAccess ({hasMunicipalWater, hasWell, hasWaterRights, waterIssues} | bool)
//  ├── wastewaterAccess ({hasMunicipalSewer, hasSeptic, wastewaterIssues} | bool)
//  ├── waterIssues, wastewaterIssues (legacy top-level lists)
//  └── environmentalIssues

// Only `price` is read strictly. Every other field that has the wrong shape is
// treated as absent and logged, so one bad optional value never costs the record.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawDocument {
    #[serde(alias = "_id", deserialize_with = "lenient")]
    id: Option<RawId>,
    #[serde(deserialize_with = "lenient")]
    address: Option<RawAddress>,
    #[serde(deserialize_with = "lenient")]
    coordinates: Option<RawCoordinates>,
    #[serde(deserialize_with = "lenient_text")]
    listing_type: Option<String>,
    #[serde(deserialize_with = "price_field")]
    price: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    water_access: Option<RawWaterAccess>,
    #[serde(deserialize_with = "lenient")]
    wastewater_access: Option<RawWastewaterAccess>,
    #[serde(deserialize_with = "lenient_list")]
    water_issues: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_list")]
    wastewater_issues: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_list")]
    environmental_issues: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient")]
    approved: Option<bool>,
    #[serde(deserialize_with = "lenient_text")]
    source: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    source_url: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    notes: Option<String>,
    #[serde(deserialize_with = "lenient")]
    property_details: Option<PropertyDetails>,
    #[serde(deserialize_with = "lenient_text")]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
    Object {
        #[serde(rename = "$oid")]
        oid: String,
    },
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
            RawId::Object { oid } => oid,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawAddress {
    #[serde(deserialize_with = "lenient_text")]
    street: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    city: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    state: Option<String>,
    #[serde(alias = "zip", deserialize_with = "lenient_text")]
    zip_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCoordinates {
    Pair(Vec<f64>),
    Point {
        coordinates: Vec<f64>,
    },
    LatLng {
        #[serde(alias = "latitude")]
        lat: f64,
        #[serde(alias = "lon", alias = "longitude")]
        lng: f64,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawWaterAccess {
    Flag(bool),
    Detail(RawWaterDetail),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawWaterDetail {
    #[serde(deserialize_with = "lenient")]
    has_municipal_water: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    has_well: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    has_water_rights: Option<bool>,
    #[serde(deserialize_with = "lenient_list")]
    water_issues: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawWastewaterAccess {
    Flag(bool),
    Detail(RawWastewaterDetail),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawWastewaterDetail {
    #[serde(deserialize_with = "lenient")]
    has_municipal_sewer: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    has_septic: Option<bool>,
    #[serde(deserialize_with = "lenient_list")]
    wastewater_issues: Option<Vec<String>>,
}

/// Any optional field: a value of the wrong shape reads as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!(error = %e, "Ignoring field with unexpected shape");
            Ok(None)
        }
    }
}

/// Text fields also take numbers, e.g. a zip code stored as `98101`.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        other => {
            warn!(value = %other, "Ignoring non-text field");
            None
        }
    })
}

/// String lists. A bare string is a one-item list; non-string items are dropped.
fn lenient_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(vec![s]),
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    Value::Null => None,
                    other => {
                        warn!(value = %other, "Ignoring non-text list item");
                        None
                    }
                })
                .collect(),
        ),
        other => {
            warn!(value = %other, "Ignoring non-list field");
            None
        }
    })
}

fn lenient_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_list(deserializer)?.unwrap_or_default())
}

/// The one strictly read field. Numeric strings are accepted as numbers.
fn price_field<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("price `{n}` is not a number"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("price `{s}` is not a number"))),
        other => Err(D::Error::custom(format!("price `{other}` is not a number"))),
    }
}

/// Trims, drops empties, and dedupes a list of issue strings.
fn issue_set<'a>(lists: impl IntoIterator<Item = Option<&'a Vec<String>>>) -> BTreeSet<String> {
    lists
        .into_iter()
        .flatten()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Best-effort id lookup on a raw document, before any validation.
pub fn document_id(raw: &Value) -> Option<String> {
    let id = raw.get("id").or_else(|| raw.get("_id"))?;
    match id {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(o) => o.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Projects a raw JSON document into a canonical `PropertyRecord`.
/// This acts as an anti-corruption layer between whatever the store holds and
/// the predicates, which never see a missing boolean or issue list.
pub fn normalize(raw: &Value) -> Result<PropertyRecord, MalformedRecordError> {
    let malformed = |id: Option<String>, reason| MalformedRecordError {
        index: None,
        id,
        reason,
    };

    let doc = RawDocument::deserialize(raw)
        .map_err(|e| malformed(document_id(raw), MalformedReason::Unreadable(e.to_string())))?;

    let id = doc
        .id
        .map(RawId::into_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    let price = doc
        .price
        .ok_or_else(|| malformed(id.clone(), MalformedReason::MissingField("price")))?;
    if !price.is_finite() || price < 0.0 {
        return Err(malformed(id, MalformedReason::InvalidPrice(price)));
    }

    let listing_type = match doc.listing_type {
        None => return Err(malformed(id, MalformedReason::MissingField("listingType"))),
        Some(raw_type) => ListingType::parse(&raw_type)
            .ok_or_else(|| malformed(id.clone(), MalformedReason::InvalidListingType(raw_type)))?,
    };

    let id = id.ok_or_else(|| malformed(None, MalformedReason::MissingField("id")))?;

    let address = doc.address.unwrap_or_default();
    let address = Address {
        street: clean(address.street),
        city: clean(address.city),
        state: clean(address.state).map(|s| s.to_uppercase()),
        zip_code: clean(address.zip_code),
    };

    let coordinates = match doc.coordinates {
        Some(RawCoordinates::Pair(pair)) | Some(RawCoordinates::Point { coordinates: pair }) => {
            match pair.as_slice() {
                [lon, lat] => {
                    let coords = Coordinates::new(*lon, *lat);
                    if coords.is_none() {
                        warn!(%id, lon = *lon, lat = *lat, "Ignoring out-of-range coordinates");
                    }
                    coords
                }
                _ => None,
            }
        }
        Some(RawCoordinates::LatLng { lat, lng }) => {
            let coords = Coordinates::new(lng, lat);
            if coords.is_none() {
                warn!(%id, lon = lng, lat, "Ignoring out-of-range coordinates");
            }
            coords
        }
        None => None,
    };

    let water_access = match doc.water_access {
        Some(RawWaterAccess::Flag(connected)) => WaterAccess {
            has_municipal_water: connected,
            water_issues: issue_set([doc.water_issues.as_ref()]),
            ..WaterAccess::default()
        },
        Some(RawWaterAccess::Detail(detail)) => WaterAccess {
            has_municipal_water: detail.has_municipal_water.unwrap_or(false),
            has_well: detail.has_well.unwrap_or(false),
            has_water_rights: detail.has_water_rights.unwrap_or(false),
            water_issues: issue_set([detail.water_issues.as_ref(), doc.water_issues.as_ref()]),
        },
        None => WaterAccess {
            water_issues: issue_set([doc.water_issues.as_ref()]),
            ..WaterAccess::default()
        },
    };

    let wastewater_access = match doc.wastewater_access {
        Some(RawWastewaterAccess::Flag(connected)) => WastewaterAccess {
            has_municipal_sewer: connected,
            wastewater_issues: issue_set([doc.wastewater_issues.as_ref()]),
            ..WastewaterAccess::default()
        },
        Some(RawWastewaterAccess::Detail(detail)) => WastewaterAccess {
            has_municipal_sewer: detail.has_municipal_sewer.unwrap_or(false),
            has_septic: detail.has_septic.unwrap_or(false),
            wastewater_issues: issue_set([
                detail.wastewater_issues.as_ref(),
                doc.wastewater_issues.as_ref(),
            ]),
        },
        None => WastewaterAccess {
            wastewater_issues: issue_set([doc.wastewater_issues.as_ref()]),
            ..WastewaterAccess::default()
        },
    };

    Ok(PropertyRecord {
        id,
        address,
        coordinates,
        listing_type,
        price,
        water_access,
        wastewater_access,
        environmental_issues: issue_set([doc.environmental_issues.as_ref()]),
        approved: doc.approved.unwrap_or(false),
        source: clean(doc.source),
        source_url: clean(doc.source_url),
        notes: clean(doc.notes),
        property_details: doc.property_details,
        created_at: clean(doc.created_at),
    })
}

/// Normalizes a whole batch. Malformed documents are skipped and reported;
/// the valid records keep their relative order.
pub fn normalize_all(raws: &[Value]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for (index, raw) in raws.iter().enumerate() {
        match normalize(raw) {
            Ok(record) => batch.records.push(record),
            Err(mut err) => {
                err.index = Some(index);
                warn!(index, error = %err, "Skipping property due to validation error");
                batch.errors.push(err);
            }
        }
    }

    batch
}
