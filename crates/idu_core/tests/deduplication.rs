use std::collections::{HashMap, HashSet};

use chrono::{TimeZone, Utc};
use idu_urban_core::identity::compare_survivors;
use idu_urban_core::{IdentityRow, IndicatorValueType, KeyValue, plan_deduplication};
use proptest::prelude::*;

fn value_type() -> impl Strategy<Value = Option<IndicatorValueType>> {
    prop_oneof![
        Just(None),
        Just(Some(IndicatorValueType::Real)),
        Just(Some(IndicatorValueType::Target)),
        Just(Some(IndicatorValueType::Forecast)),
    ]
}

fn rows() -> impl Strategy<Value = Vec<IdentityRow>> {
    proptest::collection::vec(
        (0..4i32, proptest::option::of(0..3i32), proptest::option::of(0..5i64), value_type()),
        0..40,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(index, (indicator, territory, minute, value_type))| IdentityRow {
                row_id: index as i64 + 1,
                key: vec![KeyValue::from(indicator), KeyValue::from(territory)],
                updated_at: minute.and_then(|m| Utc.timestamp_opt(1_700_000_000 + m * 60, 0).single()),
                value_type,
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn one_survivor_per_identity_tuple(rows in rows()) {
        let plan = plan_deduplication(&rows);
        let keep: HashSet<i64> = plan.keep.iter().copied().collect();
        let remove: HashSet<i64> = plan.remove.iter().copied().collect();
        prop_assert!(keep.is_disjoint(&remove));
        prop_assert_eq!(keep.len() + remove.len(), rows.len());

        let mut groups: HashMap<&Vec<KeyValue>, Vec<&IdentityRow>> = HashMap::new();
        for row in &rows {
            groups.entry(&row.key).or_default().push(row);
        }
        prop_assert_eq!(keep.len(), groups.len());
        for members in groups.values() {
            let kept: Vec<_> = members.iter().filter(|row| keep.contains(&row.row_id)).collect();
            prop_assert_eq!(kept.len(), 1);
            for other in members.iter() {
                prop_assert_ne!(compare_survivors(kept[0], other), std::cmp::Ordering::Less);
            }
        }
    }
}

#[test]
fn real_beats_forecast_at_the_same_instant() {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single();
    let rows = vec![
        IdentityRow {
            row_id: 10,
            key: vec![KeyValue::from(1)],
            updated_at: at,
            value_type: Some(IndicatorValueType::Forecast),
        },
        IdentityRow {
            row_id: 3,
            key: vec![KeyValue::from(1)],
            updated_at: at,
            value_type: Some(IndicatorValueType::Real),
        },
    ];
    let plan = plan_deduplication(&rows);
    assert_eq!(plan.keep, vec![3]);
    assert_eq!(plan.remove, vec![10]);
}
