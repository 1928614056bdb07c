use eyre::Result;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde_json::{Map, Number, Value};

use survey_isolation_forest::features::{
    compute_medians, extract_numeric_features, impute_with_medians, SURVEY_FEATURES,
};
use survey_isolation_forest::{Forest, ForestOptions, StoredModel, DEFAULT_ANOMALY_THRESHOLD};

fn number(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

/// Synthesizes a batch of catch records clustered off the Konkan coast,
/// with occasional missing temperature readings.
fn synthesize_records(count: usize) -> Result<Vec<Map<String, Value>>> {
    let rng = &mut rand::thread_rng();
    let latitudes = Normal::new(16.5, 0.4)?;
    let longitudes = Normal::new(73.2, 0.4)?;
    let weights = Normal::new(45.0, 8.0)?;
    let temperatures = Normal::new(27.0, 1.2)?;

    let mut records = Vec::with_capacity(count);
    for i in 0..count {
        let mut record = Map::new();
        record.insert("latitude".into(), number(latitudes.sample(rng)));
        record.insert("longitude".into(), number(longitudes.sample(rng)));
        record.insert("quantity".into(), Value::from(rng.gen_range(5..80)));
        // weights arrive as text in uploaded files
        record.insert(
            "weight_kg".into(),
            Value::from(format!("{:.2}", f64::max(weights.sample(rng), 0.5))),
        );
        record.insert("depth_m".into(), Value::from(rng.gen_range(10..120)));
        if i % 25 != 0 {
            record.insert("water_temperature".into(), number(temperatures.sample(rng)));
        }
        records.push(record);
    }
    Ok(records)
}

/// Plants records far outside the fleet's usual grounds.
fn plant_outliers(records: &mut Vec<Map<String, Value>>) {
    let planted = [
        (55.0, -140.0, 4000, 9500.0, 4800),
        (-62.0, 15.0, 2, 0.1, 2),
        (16.4, 73.1, 75000, 88000.0, 11000),
    ];
    for (latitude, longitude, quantity, weight_kg, depth_m) in planted {
        let mut record = Map::new();
        record.insert("latitude".into(), number(latitude));
        record.insert("longitude".into(), number(longitude));
        record.insert("quantity".into(), Value::from(quantity));
        record.insert("weight_kg".into(), number(weight_kg));
        record.insert("depth_m".into(), Value::from(depth_m));
        records.push(record);
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let mut records = synthesize_records(400)?;
    plant_outliers(&mut records);

    // prepare: extract, then impute missing cells with column medians
    let raw = extract_numeric_features(&records, &SURVEY_FEATURES);
    let medians = compute_medians(&raw);
    let matrix = impute_with_medians(&raw, &medians);

    let forest = Forest::fit(&matrix, &SURVEY_FEATURES, &ForestOptions::default())?;

    println!(
        "scored {} records with {} trees (sample size {})",
        matrix.len(),
        forest.tree_count(),
        forest.sample_size()
    );
    println!("flagged records (threshold {}):", DEFAULT_ANOMALY_THRESHOLD);
    for (index, row) in matrix.iter().enumerate() {
        let prediction = forest.predict(row, DEFAULT_ANOMALY_THRESHOLD);
        if prediction.is_anomaly {
            println!(
                "  #{:<4} score {:.3}  lat {:>8.2}  lon {:>8.2}  qty {:>7.0}  kg {:>8.1}",
                index, prediction.score, row[0], row[1], row[2], row[3]
            );
        }
    }

    // a stored model reproduces the scores exactly after a round trip
    let stored = serde_json::to_string(&StoredModel::from_forest(&forest))?;
    let restored: StoredModel = serde_json::from_str(&stored)?;
    let restored = restored.into_forest()?;
    let last = matrix.len() - 1;
    println!(
        "stored model round trip: {} bytes, score {:.3} == {:.3}",
        stored.len(),
        forest.score(&matrix[last]),
        restored.score(&matrix[last])
    );
    Ok(())
}
