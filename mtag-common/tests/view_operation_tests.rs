//! Integration tests for the read view, operation and diff engines
//!
//! Drives frames through `SchemaViewBuilder::build` -> `compute_planned` ->
//! `diff` -> `plan_writes` without any file I/O.

use mtag_common::{
    compute_planned, diff, AliasTable, FieldMap, Filter, FilterSet, Frame, NativeWrite, Operation,
    Schema, SchemaViewBuilder,
};

fn v(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Apply native writes to a frame list the way a TagStore would
fn apply_writes(frames: &mut Vec<Frame>, writes: &[NativeWrite]) {
    for write in writes {
        frames.retain(|f| f.raw_key != write.raw_key);
        if let Some(values) = &write.values {
            frames.push(Frame::new(write.raw_key.clone(), values.clone()));
        }
    }
}

#[test]
fn test_custom_key_case_collapse_keeps_both_values() {
    let builder = SchemaViewBuilder::new(AliasTable::standard());
    let frames = vec![
        Frame::text("TIT2", "  Song  "),
        Frame::text("TPE1", "Artist A"),
        Frame::text("My Field", "v1"),
        Frame::text("MY_FIELD", "v2"),
    ];

    let view = builder.build(&frames, Schema::Extended);

    let mut expected = FieldMap::new();
    expected.insert("title".into(), v(&["Song"]));
    expected.insert("artist".into(), v(&["Artist A"]));
    expected.insert("my_field".into(), v(&["v1", "v2"]));
    assert_eq!(view, expected);
}

#[test]
fn test_write_then_enlist_round_trip() {
    let aliases = AliasTable::standard();
    let builder = SchemaViewBuilder::new(aliases);
    let mut frames = vec![
        Frame::text("TIT2", "  Song  "),
        Frame::text("TPE1", "Artist A"),
        Frame::text("My Field", "v1"),
        Frame::text("MY_FIELD", "v2"),
    ];

    let original = builder.build(&frames, Schema::Extended);
    let ops = vec![
        Operation::write("title", "New Song", ";"),
        Operation::enlist("genre", "Rock;Pop", ";"),
    ];
    let planned = compute_planned(&original, &ops, Schema::Extended, aliases);
    let changed = diff(&original, &planned);

    assert_eq!(changed.len(), 2);
    assert_eq!(changed["title"], v(&["New Song"]));
    assert_eq!(changed["genre"], v(&["Rock", "Pop"]));
    assert_eq!(planned["my_field"], v(&["v1", "v2"]));

    let writes = builder.plan_writes(&frames, &planned, &changed, Schema::Extended);
    apply_writes(&mut frames, &writes);

    let reread = builder.build(&frames, Schema::Extended);
    for (field, values) in &changed {
        assert_eq!(reread.get(field), Some(values), "field {}", field);
    }
    // TIT2 was folded into the canonical key
    assert!(!frames.iter().any(|f| f.raw_key == "TIT2"));
}

#[test]
fn test_smart_empty_survives_round_trip() {
    let aliases = AliasTable::standard();
    let builder = SchemaViewBuilder::new(aliases);
    let mut frames = vec![Frame::text("COMM", "note"), Frame::text("TCON", "Rock")];

    let original = builder.build(&frames, Schema::Canonical);
    let planned = compute_planned(
        &original,
        &[Operation::clear("comment"), Operation::delete("genre")],
        Schema::Canonical,
        aliases,
    );
    let changed = diff(&original, &planned);
    let writes = builder.plan_writes(&frames, &planned, &changed, Schema::Canonical);
    apply_writes(&mut frames, &writes);

    let reread = builder.build(&frames, Schema::Canonical);
    assert_eq!(reread.get("comment"), Some(&v(&[""])));
    assert!(!reread.contains_key("genre"));
}

#[test]
fn test_write_once_per_field() {
    let aliases = AliasTable::standard();
    let builder = SchemaViewBuilder::new(aliases);
    let frames = vec![
        Frame::new("GENRE", v(&["Rock", "Pop"])),
        Frame::new("genre", v(&["Rock", "Pop"])),
    ];

    let original = builder.build(&frames, Schema::Extended);
    assert_eq!(original["genre"], v(&["Rock", "Pop"]));

    let planned = compute_planned(
        &original,
        &[Operation::append("genre", "Jazz", ";")],
        Schema::Extended,
        aliases,
    );
    let changed = diff(&original, &planned);
    let writes = builder.plan_writes(&frames, &planned, &changed, Schema::Extended);

    let emitted: Vec<_> = writes.iter().filter(|w| w.values.is_some()).collect();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].raw_key, "genre");
    assert_eq!(emitted[0].values, Some(v(&["Rock", "Pop", "Jazz"])));
}

#[test]
fn test_raw_schema_targets_native_keys() {
    let aliases = AliasTable::standard();
    let builder = SchemaViewBuilder::new(aliases);
    let mut frames = vec![Frame::text("TIT2", "Song"), Frame::text("TXXX:Mood", "calm")];

    let original = builder.build(&frames, Schema::Raw);
    let planned = compute_planned(
        &original,
        &[Operation::write("tit2", "Other", ";")],
        Schema::Raw,
        aliases,
    );
    let changed = diff(&original, &planned);
    assert_eq!(changed.keys().collect::<Vec<_>>(), vec!["TIT2"]);

    let writes = builder.plan_writes(&frames, &planned, &changed, Schema::Raw);
    apply_writes(&mut frames, &writes);
    let reread = builder.build(&frames, Schema::Raw);
    assert_eq!(reread["TIT2"], v(&["Other"]));
    assert_eq!(reread["TXXX:Mood"], v(&["calm"]));
}

#[test]
fn test_filters_run_against_canonical_view() {
    let builder = SchemaViewBuilder::new(AliasTable::standard());
    let frames = vec![Frame::text("TPE1", "The Beatles"), Frame::text("TDRC", "1969")];
    let view = builder.build(&frames, Schema::Canonical);

    let filters = FilterSet::new(vec![
        Filter::new("artist", "Beatles", false).unwrap(),
        Filter::new("date", "^196", true).unwrap(),
    ]);
    assert!(filters.matches(&view));

    let no_date = builder.build(&frames[..1], Schema::Canonical);
    assert!(!filters.matches(&no_date));
}
