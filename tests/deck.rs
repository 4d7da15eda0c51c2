// tests/deck.rs
use labdeck::{
    Coordinate, Culture, Deck, DeckConfig, GridLayout, Liquid, Resource, ResourceData,
    ResourceError, ResourceId, ResourceKind, ResourceTree, Rotation, Tip, TrackerError,
    TrackingConfig, Tube, WellTemplate,
};
use serde_json::json;
use tempfile::tempdir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn tip() -> Tip {
    Tip::new(false, 59.9, 300.0, 8.0).with_model("standard_300")
}

struct Layout {
    deck: Deck,
    tips: ResourceId,
    plate: ResourceId,
    tubes: ResourceId,
    dish: ResourceId,
}

/// A deck with one of everything, and some tracker state on it.
fn full_layout() -> Layout {
    let mut deck = Deck::new(DeckConfig::default().with_origin(Coordinate::new(5.0, 10.0, 0.0)));
    let tree = deck.tree_mut();

    let tips = tree
        .create_tip_rack(
            Resource::new("tips", 122.4, 82.6, 60.0).with_model("tiprack_300"),
            GridLayout::new(12, 8).with_offset(7.2, 5.3, 0.0),
            tip(),
            true,
        )
        .unwrap();
    let plate = tree
        .create_plate(
            Resource::new("plate", 127.76, 85.48, 14.2).with_model("corning_96"),
            GridLayout::new(12, 8).with_offset(11.24, 7.76, 1.0).with_item_size(6.86, 6.86, 10.67),
            WellTemplate {
                max_volume: Some(360.0),
                ..WellTemplate::default()
            },
            Some(5.0),
        )
        .unwrap();
    let tubes = tree
        .create_tube_rack(
            Resource::new("tubes", 80.0, 60.0, 40.0),
            GridLayout::new(4, 3).with_pitch(18.0, 18.0).with_offset(4.0, 5.0, 2.0),
            Tube::new(10.8, 10.8, 40.0, 1500.0).with_model("eppendorf_1.5"),
        )
        .unwrap();
    tree.rotate(tubes, 90).unwrap();
    let dish = tree.create_petri_dish("dish", 90.0, 15.0);
    tree.add_colony(
        dish,
        "colony_1",
        Coordinate::new(40.0, 40.0, 2.0),
        2.0,
        Some(Culture::new("E. coli")),
    )
    .unwrap();
    let trash = tree.insert(
        Resource::new("trash", 100.0, 100.0, 50.0)
            .with_category("trash")
            .with_kind(ResourceKind::Trash),
    );

    // Tracker state.
    let a1 = tree.get_item_by_name(tips, "A1").unwrap();
    tree.tip_spot_mut(a1).unwrap().tracker.remove().unwrap();
    let b1 = tree.get_well(plate, "B1").unwrap();
    tree.well_mut(b1)
        .unwrap()
        .tracker
        .add_liquid(Some(Liquid::Water), 120.0)
        .unwrap();
    let spot = tree.get_item_by_name(tubes, "A1").unwrap();
    let tube = tree.tube_spot(spot).unwrap().make_tube();
    tree.tube_spot_mut(spot).unwrap().tracker.add(tube).unwrap();

    deck.assign_child_resource(tips, Coordinate::new(100.0, 60.0, 0.0))
        .unwrap();
    deck.assign_child_resource(plate, Coordinate::new(250.0, 60.0, 0.0))
        .unwrap();
    deck.assign_child_resource(tubes, Coordinate::new(400.0, 60.0, 0.0))
        .unwrap();
    deck.assign_child_resource(dish, Coordinate::new(550.0, 60.0, 0.0))
        .unwrap();
    deck.assign_child_resource(trash, Coordinate::new(1200.0, 60.0, 0.0))
        .unwrap();

    Layout {
        deck,
        tips,
        plate,
        tubes,
        dish,
    }
}

// --- ROUND TRIP ---

#[test]
fn test_saved_deck_loads_equal() {
    init_tracing();
    let mut deck = Deck::default();
    let tree = deck.tree_mut();
    let tc = tree.insert(Resource::new("tc", 200.0, 200.0, 200.0));
    let pc = tree.insert(Resource::new("pc", 200.0, 200.0, 200.0));
    deck.assign_child_resource(tc, Coordinate::new(0.0, 0.0, 0.0)).unwrap();
    deck.assign_child_resource(pc, Coordinate::new(100.0, 0.0, 0.0))
        .unwrap();

    let dir = tempdir().unwrap();
    let path = dir.path().join("deck.json");
    deck.save(&path).unwrap();
    let loaded = Deck::load_from_json_file(&path).unwrap();

    assert_eq!(loaded, deck);
    let pc = loaded.get_resource("pc").unwrap();
    assert_eq!(
        loaded.tree().get_absolute_location(pc).unwrap(),
        Coordinate::new(100.0, 0.0, 0.0)
    );
}

#[test]
fn test_full_layout_round_trips_through_json() {
    let layout = full_layout();
    let data = layout.deck.serialize().unwrap();
    let json = serde_json::to_string_pretty(&data).unwrap();
    let parsed: ResourceData = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, data);

    let loaded = Deck::deserialize(&parsed).unwrap();
    assert_eq!(loaded, layout.deck);
    assert_eq!(loaded.serialize().unwrap(), data);
    assert_eq!(loaded.tree().len(), layout.deck.tree().len());

    let tree = loaded.tree();
    let plate = loaded.get_resource("plate").unwrap();
    assert!(tree.has_lid(plate).unwrap());
    assert_eq!(tree.get_all_items(plate).unwrap().len(), 96);
    let h12 = tree.get_well(plate, "H12").unwrap();
    assert_eq!(tree.name(h12).unwrap(), "plate_H12");
    assert_eq!(tree.well(h12).unwrap().max_volume(), 360.0);

    let tubes = loaded.get_resource("tubes").unwrap();
    let node = tree.resource(tubes).unwrap();
    assert_eq!(node.rotation(), Rotation::R90);
    assert_eq!((node.get_size_x(), node.get_size_y()), (60.0, 80.0));

    let dish = loaded.get_resource("dish").unwrap();
    assert_eq!(tree.get_colonies(dish).unwrap().len(), 1);
    assert_eq!(
        tree.get_absolute_location(loaded.get_resource("colony_1").unwrap())
            .unwrap(),
        Coordinate::new(595.0, 110.0, 2.0)
    );
}

#[test]
fn test_layout_json_uses_type_tags() {
    let layout = full_layout();
    let value = serde_json::to_value(layout.deck.serialize().unwrap()).unwrap();

    assert_eq!(value["type"], "Deck");
    assert_eq!(value["name"], "deck");
    let children = value["children"].as_array().unwrap();
    let types: Vec<&str> = children
        .iter()
        .map(|child| child["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, ["TipRack", "Plate", "TubeRack", "PetriDish", "Trash"]);

    let tubes = &children[2];
    assert_eq!(tubes["rotation"], 90);
    assert_eq!(tubes["num_items_x"], 4);
    assert_eq!(tubes["parent_name"], "deck");
    assert_eq!(tubes["children"][0]["type"], "TubeSpot");
    assert_eq!(children[1]["children"][0]["type"], "Well");
    assert_eq!(children[1]["children"][0]["max_volume"], 360.0);
}

// --- STATE ---

#[test]
fn test_state_replays_onto_loaded_layout() {
    let layout = full_layout();
    let snapshot = layout.deck.serialize_all_state().unwrap();
    let mut loaded = Deck::deserialize(&layout.deck.serialize().unwrap()).unwrap();

    loaded.load_all_state(&snapshot).unwrap();
    assert_eq!(loaded.serialize_all_state().unwrap(), snapshot);

    let tree = loaded.tree();
    let tips = loaded.get_resource("tips").unwrap();
    assert!(tree.get_tip(tips, "A1").is_err());
    assert_eq!(tree.get_tip(tips, "B1").unwrap(), tip());
    let b1 = tree.get_well(loaded.get_resource("plate").unwrap(), "B1").unwrap();
    assert_eq!(tree.well(b1).unwrap().tracker.get_used_volume(), 120.0);
    let colony = loaded.get_resource("colony_1").unwrap();
    assert_eq!(
        tree.colony(colony).unwrap().tracker.get_item().unwrap(),
        &Culture::new("E. coli")
    );
    let tubes = loaded.get_resource("tubes").unwrap();
    assert_eq!(tree.get_occupied_items(tubes).unwrap().len(), 1);

    assert_eq!(snapshot["trash"], serde_json::json!({}));
}

#[test]
fn test_state_file_round_trip() {
    let layout = full_layout();
    let dir = tempdir().unwrap();
    let layout_path = dir.path().join("layout.json");
    let state_path = dir.path().join("state.json");
    layout.deck.save(&layout_path).unwrap();
    layout.deck.save_state_to_file(&state_path).unwrap();

    let mut loaded = Deck::load_from_json_file(&layout_path).unwrap();
    loaded.load_state_from_file(&state_path).unwrap();
    assert_eq!(
        loaded.serialize_all_state().unwrap(),
        layout.deck.serialize_all_state().unwrap()
    );
}

#[test]
fn test_incomplete_snapshot_loads_nothing() {
    let layout = full_layout();
    let mut snapshot = layout.deck.serialize_all_state().unwrap();
    snapshot.remove("plate_H12");
    let mut loaded = Deck::deserialize(&layout.deck.serialize().unwrap()).unwrap();

    assert!(matches!(
        loaded.load_all_state(&snapshot),
        Err(ResourceError::MissingState(name)) if name == "plate_H12"
    ));
    let plate = loaded.get_resource("plate").unwrap();
    let b1 = loaded.tree().get_well(plate, "B1").unwrap();
    assert_eq!(loaded.tree().well(b1).unwrap().tracker.get_used_volume(), 0.0);
}

#[test]
fn test_malformed_entry_loads_nothing() {
    let layout = full_layout();
    let mut snapshot = layout.deck.serialize_all_state().unwrap();
    snapshot.insert(
        "plate_A1".to_string(),
        json!({"liquids": [[null, 50.0]], "pending_liquids": [[null, 50.0]]}),
    );
    snapshot.insert("plate_H12".to_string(), json!({"garbage": true}));
    let mut loaded = Deck::deserialize(&layout.deck.serialize().unwrap()).unwrap();

    assert!(matches!(
        loaded.load_all_state(&snapshot),
        Err(ResourceError::Tracker(TrackerError::InvalidState { thing, .. })) if thing == "plate_H12"
    ));
    let plate = loaded.get_resource("plate").unwrap();
    for name in ["A1", "B1"] {
        let well = loaded.tree().get_well(plate, name).unwrap();
        assert_eq!(loaded.tree().well(well).unwrap().tracker.get_used_volume(), 0.0);
    }
    let tubes = loaded.get_resource("tubes").unwrap();
    let spot = loaded.tree().get_item_by_name(tubes, "A1").unwrap();
    assert!(!loaded.tree().tube_spot(spot).unwrap().has_tube());
}

#[test]
fn test_overfull_entry_loads_nothing() {
    let layout = full_layout();
    let mut snapshot = layout.deck.serialize_all_state().unwrap();
    snapshot.insert(
        "plate_A1".to_string(),
        json!({"liquids": [[null, 5000.0]], "pending_liquids": [[null, 5000.0]]}),
    );
    let mut loaded = Deck::deserialize(&layout.deck.serialize().unwrap()).unwrap();

    assert!(matches!(
        loaded.load_all_state(&snapshot),
        Err(ResourceError::Tracker(TrackerError::CapacityExceeded { thing, .. })) if thing == "plate_A1"
    ));
    let plate = loaded.get_resource("plate").unwrap();
    let a1 = loaded.tree().get_well(plate, "A1").unwrap();
    let well = loaded.tree().well(a1).unwrap();
    assert_eq!(well.tracker.get_used_volume(), 0.0);
    assert_eq!(well.max_volume(), 360.0);
    let b1 = loaded.tree().get_well(plate, "B1").unwrap();
    assert_eq!(loaded.tree().well(b1).unwrap().tracker.get_used_volume(), 0.0);
}

#[test]
fn test_untracked_load_disables_trackers() {
    let layout = full_layout();
    let data = layout.deck.serialize().unwrap();
    let loaded = Deck::deserialize_with(&data, TrackingConfig::untracked()).unwrap();

    let tips = loaded.get_resource("tips").unwrap();
    assert_eq!(loaded.tree().get_all_tips(tips).unwrap().len(), 96);
    let spot = loaded.tree().get_item(tips, 0).unwrap();
    assert!(loaded.tree().tracker(spot).unwrap().is_disabled());
}

// --- COPIES ---

#[test]
fn test_copy_is_independent() {
    let mut layout = full_layout();
    let plate = layout.plate;
    let tree = layout.deck.tree_mut();

    let copy = tree.copy(plate).unwrap();
    assert_eq!(tree.resource(copy).unwrap().parent(), None);
    assert_eq!(
        tree.serialize_all_state(copy).unwrap(),
        tree.serialize_all_state(plate).unwrap()
    );

    let copy_b1 = tree.get_well(copy, "B1").unwrap();
    tree.well_mut(copy_b1).unwrap().tracker.remove_liquid(20.0).unwrap();
    let original_b1 = tree.get_well(plate, "B1").unwrap();
    assert_eq!(tree.well(original_b1).unwrap().tracker.get_used_volume(), 120.0);
    assert_eq!(tree.well(copy_b1).unwrap().tracker.get_used_volume(), 100.0);

    // The copy is not on the deck.
    assert_eq!(layout.deck.get_resource("plate").unwrap(), plate);
}

#[test]
fn test_rotated_copy_can_be_turned_back() {
    let mut layout = full_layout();
    let plate = layout.plate;
    let tree = layout.deck.tree_mut();

    let turned = tree.rotated(plate, 90).unwrap();
    assert_eq!(tree.resource(turned).unwrap().rotation(), Rotation::R90);
    assert_eq!(tree.resource(plate).unwrap().rotation(), Rotation::R0);

    let original = tree.get_well(plate, "C5").unwrap();
    let copy = tree.get_well(turned, "C5").unwrap();
    assert_ne!(
        tree.resource(copy).unwrap().location(),
        tree.resource(original).unwrap().location()
    );

    tree.rotate(turned, 270).unwrap();
    assert_eq!(tree.resource(turned).unwrap().rotation(), Rotation::R0);
    assert_eq!(
        tree.resource(copy).unwrap().location(),
        tree.resource(original).unwrap().location()
    );
    assert!(matches!(
        tree.rotated(plate, 30),
        Err(ResourceError::InvalidRotation(30))
    ));
}

// --- LOOKUP ---

#[test]
fn test_lookup_by_name_across_the_deck() {
    let layout = full_layout();
    let deck = &layout.deck;

    assert_eq!(deck.get_resource("tips").unwrap(), layout.tips);
    assert_eq!(deck.get_resource("dish").unwrap(), layout.dish);
    assert!(deck.has_resource("tubes_C4"));
    assert!(!deck.has_resource("tubes_D1"));
    assert!(matches!(
        deck.get_resource("carrier"),
        Err(ResourceError::NotFound(name)) if name == "carrier"
    ));
    assert!(!deck.has_resource("deck"));

    let all = deck.get_all_resources().unwrap();
    assert_eq!(all.len(), deck.tree().len() - 1);
    assert_eq!(all[0], layout.tips);
    assert_eq!(deck.get_trash_area().unwrap(), deck.get_resource("trash").unwrap());
}

#[test]
fn test_shared_names_are_ambiguous() {
    let mut deck = Deck::default();
    let tree = deck.tree_mut();
    let first = tree.insert(Resource::new("carrier_1", 100.0, 400.0, 20.0));
    let second = tree.insert(Resource::new("carrier_2", 100.0, 400.0, 20.0));
    for carrier in [first, second] {
        let plate = tree.insert(Resource::new("plate", 127.0, 85.0, 14.0));
        tree.assign_child_resource(carrier, plate, Coordinate::new(0.0, 10.0, 5.0))
            .unwrap();
    }
    deck.assign_child_resource(first, Coordinate::ZERO).unwrap();
    deck.assign_child_resource(second, Coordinate::new(120.0, 0.0, 0.0))
        .unwrap();

    let err = deck.get_resource("plate").unwrap_err();
    assert!(matches!(
        &err,
        ResourceError::Ambiguous { name, parents }
            if name == "plate" && parents == &["carrier_1", "carrier_2"]
    ));
    assert!(err.to_string().contains("carrier_1, carrier_2"));
    assert!(deck.has_resource("plate"));
}

#[test]
fn test_trash_must_be_a_trash_kind() {
    let mut deck = Deck::default();
    assert!(matches!(deck.get_trash_area(), Err(ResourceError::NotFound(_))));

    let fake = deck.tree_mut().insert(Resource::new("trash", 10.0, 10.0, 10.0));
    deck.assign_child_resource(fake, Coordinate::ZERO).unwrap();
    assert!(matches!(
        deck.get_trash_area(),
        Err(ResourceError::WrongKind { expected: "trash", .. })
    ));
}

#[test]
fn test_summary_and_clear() {
    let mut deck = Deck::default();
    let tree = deck.tree_mut();
    let tc = tree.insert(Resource::new("tc", 200.0, 200.0, 200.0));
    let location = Coordinate::new(12.5, 0.0, 0.0);
    deck.assign_child_resource(tc, location).unwrap();

    assert_eq!(
        deck.summary().unwrap(),
        format!("Deck: 1360 x 653.5 mm\n\ntc: Resource at {location}\n")
    );

    deck.clear().unwrap();
    assert!(deck.get_all_resources().unwrap().is_empty());
    assert!(deck.tree().contains(tc));
    assert_eq!(deck.tree().resource(tc).unwrap().parent(), None);
}

// --- ERRORS ---

#[test]
fn test_unknown_type_leaves_tree_untouched() {
    let layout = full_layout();
    let mut data = layout.deck.serialize().unwrap();
    data.children[1].children[3].resource_type = "Carrier".to_string();

    let mut tree = ResourceTree::new();
    let existing = tree.insert(Resource::new("existing", 1.0, 1.0, 1.0));
    assert!(matches!(
        tree.deserialize(&data),
        Err(ResourceError::UnknownResourceType(tag)) if tag == "Carrier"
    ));
    assert_eq!(tree.len(), 1);
    assert!(tree.contains(existing));

    data.resource_type = "Carrier".to_string();
    assert!(matches!(
        Deck::deserialize(&data),
        Err(ResourceError::UnknownResourceType(_))
    ));
}

#[test]
fn test_malformed_layouts_are_rejected() {
    let layout = full_layout();
    let data = layout.deck.serialize().unwrap();

    let mut missing = data.clone();
    missing.children[4].location = None;
    assert!(matches!(
        Deck::deserialize(&missing),
        Err(ResourceError::MissingLocation(name)) if name == "trash"
    ));

    let mut short = data.clone();
    short.children[0].children.pop();
    assert!(matches!(
        Deck::deserialize(&short),
        Err(ResourceError::GridMismatch { expected: 96, found: 95, .. })
    ));

    assert!(matches!(
        Deck::deserialize(&data.children[1]),
        Err(ResourceError::WrongKind { expected: "deck", .. })
    ));

    let mut bad_details = data;
    bad_details.children[0].details.remove("num_items_x");
    assert!(matches!(
        Deck::deserialize(&bad_details),
        Err(ResourceError::Serialization(_))
    ));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        Deck::load_from_json_file(dir.path().join("absent.json")),
        Err(ResourceError::Io(_))
    ));
}

#[test]
fn test_deck_origin_survives_round_trip() {
    let layout = full_layout();
    let data = layout.deck.serialize().unwrap();
    assert_eq!(data.location, Some(Coordinate::new(5.0, 10.0, 0.0)));

    let loaded = Deck::deserialize(&data).unwrap();
    assert_eq!(loaded.config().origin, Coordinate::new(5.0, 10.0, 0.0));
    let tips = loaded.get_resource("tips").unwrap();
    assert_eq!(
        loaded.tree().get_absolute_location(tips).unwrap(),
        Coordinate::new(105.0, 70.0, 0.0)
    );
    let tubes = loaded.get_resource("tubes").unwrap();
    assert_eq!(
        loaded.tree().get_absolute_location(tubes).unwrap(),
        layout.deck.tree().get_absolute_location(layout.tubes).unwrap()
    );
}
