// src/domain/geojson.rs

use serde_json::{json, Value};

use crate::domain::challenges::ChallengeClassifier;
use crate::domain::property::PropertyRecord;

/// Builds the FeatureCollection the map clusters. Records without coordinates
/// are left out here and nowhere else.
pub fn feature_collection<'a, I>(records: I, classifier: &ChallengeClassifier) -> Value
where
    I: IntoIterator<Item = &'a PropertyRecord>,
{
    let features: Vec<Value> = records
        .into_iter()
        .filter_map(|record| {
            let coords = record.coordinates?;
            Some(json!({
                "type": "Feature",
                "id": record.id,
                "geometry": {
                    "type": "Point",
                    "coordinates": [coords.longitude, coords.latitude],
                },
                "properties": {
                    "id": record.id,
                    "listingType": record.listing_type.as_str(),
                    "price": record.price,
                    "state": record.address.state,
                    "address": record.address.one_line(),
                    "challenges": classifier.derive_challenges(record),
                },
            }))
        })
        .collect();

    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}
