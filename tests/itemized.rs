// tests/itemized.rs
use labdeck::{
    Coordinate, CrossSectionType, GridLayout, Liquid, Resource, ResourceError, ResourceId,
    ResourceKind, ResourceTree, Tip, TrackerError, TrackingConfig, Tube, WellBottomType,
    WellTemplate,
};

fn tip() -> Tip {
    Tip::new(false, 59.9, 300.0, 8.0).with_model("standard_300")
}

fn small_tip_rack(tree: &mut ResourceTree, with_tips: bool) -> ResourceId {
    tree.create_tip_rack(
        Resource::new("tips", 27.0, 18.0, 50.0),
        GridLayout::new(3, 2),
        tip(),
        with_tips,
    )
    .unwrap()
}

fn plate_96(tree: &mut ResourceTree, lid_height: Option<f64>) -> ResourceId {
    tree.create_plate(
        Resource::new("plate", 127.76, 85.48, 14.2).with_model("corning_96"),
        GridLayout::new(12, 8)
            .with_offset(11.24, 7.76, 1.0)
            .with_item_size(6.86, 6.86, 10.67),
        WellTemplate {
            bottom_type: WellBottomType::Flat,
            cross_section_type: CrossSectionType::Circle,
            max_volume: Some(360.0),
        },
        lid_height,
    )
    .unwrap()
}

// --- ADDRESSING ---

#[test]
fn test_index_cell_and_name_agree() {
    let mut tree = ResourceTree::new();
    let rack = small_tip_rack(&mut tree, true);

    let first = tree.get_item(rack, 0).unwrap();
    assert_eq!(tree.get_item_at(rack, 0, 0).unwrap(), first);
    assert_eq!(tree.get_item_by_name(rack, "A1").unwrap(), first);
    assert_eq!(tree.get_item_by_name(rack, "a1").unwrap(), first);
    assert_eq!(tree.name(first).unwrap(), "tips_A1");

    // Column-major: B1 follows A1, A2 follows the whole first column.
    assert_eq!(tree.get_item_by_name(rack, "B1").unwrap(), tree.get_item(rack, 1).unwrap());
    assert_eq!(tree.get_item_by_name(rack, "A2").unwrap(), tree.get_item(rack, 2).unwrap());
    assert_eq!(tree.name(tree.get_item(rack, 5).unwrap()).unwrap(), "tips_B3");

    let spot = tree.resource(first).unwrap();
    assert_eq!(spot.category(), Some("tip_spot"));
    assert_eq!(spot.location(), Some(Coordinate::new(0.0, 9.0, 0.0)));
    assert_eq!(spot.parent(), Some(rack));
}

#[test]
fn test_bad_addresses_are_reported() {
    let mut tree = ResourceTree::new();
    let rack = small_tip_rack(&mut tree, true);

    assert!(matches!(
        tree.get_item(rack, 6),
        Err(ResourceError::IndexOutOfRange { index: 6, len: 6, .. })
    ));
    assert!(matches!(
        tree.get_item_by_name(rack, "C1"),
        Err(ResourceError::NoSuchSpot { identifier, .. }) if identifier == "C1"
    ));
    assert!(matches!(
        tree.get_item_by_name(rack, "A0"),
        Err(ResourceError::NoSuchSpot { .. })
    ));
    assert!(matches!(
        tree.get_item_at(rack, 0, 3),
        Err(ResourceError::NoSuchSpot { .. })
    ));
    assert!(matches!(
        tree.get_items_by_range(rack, "A1:C1"),
        Err(ResourceError::NoSuchSpot { .. })
    ));
}

#[test]
fn test_ranges_expand_column_major() {
    let mut tree = ResourceTree::new();
    let rack = small_tip_rack(&mut tree, true);
    let all = tree.get_all_items(rack).unwrap();
    assert_eq!(all.len(), 6);

    assert_eq!(tree.get_items_by_range(rack, "A1:B2").unwrap(), all[0..4].to_vec());
    assert_eq!(
        tree.get_items_by_range(rack, "A1:A3").unwrap(),
        vec![all[0], all[2], all[4]]
    );
    assert_eq!(
        tree.get_items_by_range(rack, "B2:A1").unwrap(),
        tree.get_items_by_range(rack, "A1:B2").unwrap()
    );
    assert_eq!(
        tree.get_items_by_range(rack, "B3, A1").unwrap(),
        vec![all[5], all[0]]
    );
    assert_eq!(tree.get_items(rack, &[3, 1]).unwrap(), vec![all[3], all[1]]);
}

#[test]
fn test_grid_items_cannot_be_detached() {
    let mut tree = ResourceTree::new();
    let rack = small_tip_rack(&mut tree, true);
    let spot = tree.get_item(rack, 0).unwrap();

    assert!(matches!(
        tree.unassign(spot),
        Err(ResourceError::FixedGridItem { .. })
    ));
    assert_eq!(tree.grid(rack).unwrap().items().len(), 6);
}

// --- TIP RACKS ---

#[test]
fn test_tip_state_from_range_and_grid() {
    let mut tree = ResourceTree::new();
    let rack = small_tip_rack(&mut tree, false);
    let all = tree.get_all_items(rack).unwrap();
    assert!(tree.get_occupied_items(rack).unwrap().is_empty());

    tree.set_tip_state(rack, "A1:A3").unwrap();
    assert_eq!(
        tree.get_occupied_items(rack).unwrap(),
        vec![all[0], all[2], all[4]]
    );
    assert_eq!(tree.get_tip(rack, "A2").unwrap(), tip());
    assert!(matches!(
        tree.get_tip(rack, "B1"),
        Err(ResourceError::Tracker(TrackerError::NoItem { .. }))
    ));
    assert_eq!(tree.get_tips(rack, "A1:A2").unwrap(), vec![tip(), tip()]);

    tree.set_tip_state(
        rack,
        vec![vec![true, false, false], vec![false, false, true]],
    )
    .unwrap();
    assert_eq!(tree.get_occupied_items(rack).unwrap(), vec![all[0], all[5]]);

    let err = tree.set_tip_state(rack, vec![vec![true; 2]; 2]).unwrap_err();
    assert!(matches!(
        err,
        ResourceError::PatternMismatch { expected: 6, found: 4, .. }
    ));
    assert_eq!(tree.get_occupied_items(rack).unwrap(), vec![all[0], all[5]]);
}

#[test]
fn test_fill_and_empty_tip_rack() {
    let mut tree = ResourceTree::new();
    let rack = small_tip_rack(&mut tree, false);

    tree.fill_tip_rack(rack).unwrap();
    assert_eq!(tree.get_all_tips(rack).unwrap(), vec![tip(); 6]);

    tree.empty_tip_rack(rack).unwrap();
    assert!(tree.get_occupied_items(rack).unwrap().is_empty());
    assert!(tree.get_all_tips(rack).is_err());
}

#[test]
fn test_disabled_trackers_hand_out_prototypes() {
    let mut tree = ResourceTree::new();
    let rack = small_tip_rack(&mut tree, false);

    tree.disable_trackers(rack).unwrap();
    assert_eq!(tree.get_all_tips(rack).unwrap().len(), 6);
    let spot = tree.get_item(rack, 3).unwrap();
    assert!(tree.tracker(spot).unwrap().is_disabled());

    tree.enable_trackers(rack).unwrap();
    assert!(!tree.tracker(spot).unwrap().is_disabled());
    assert!(tree.get_all_tips(rack).is_err());
}

#[test]
fn test_tracking_config_disables_tip_trackers_only() {
    let mut tree = ResourceTree::with_tracking(TrackingConfig::default().with_tip_tracking(false));
    let rack = small_tip_rack(&mut tree, false);
    let plate = plate_96(&mut tree, None);

    let spot = tree.get_item(rack, 0).unwrap();
    assert!(tree.tracker(spot).unwrap().is_disabled());
    assert_eq!(tree.get_tip(rack, "A1").unwrap(), tip());

    let well = tree.get_well(plate, "A1").unwrap();
    assert!(!tree.tracker(well).unwrap().is_disabled());
}

#[test]
fn test_typed_accessors_check_the_kind() {
    let mut tree = ResourceTree::new();
    let rack = small_tip_rack(&mut tree, true);
    let plate = plate_96(&mut tree, None);

    assert!(matches!(
        tree.get_tip(plate, "A1"),
        Err(ResourceError::WrongKind { expected: "tip rack", .. })
    ));
    assert!(matches!(
        tree.get_well(rack, "A1"),
        Err(ResourceError::WrongKind { expected: "plate", .. })
    ));
    let loose = tree.insert(Resource::new("loose", 1.0, 1.0, 1.0));
    assert!(matches!(
        tree.get_item(loose, 0),
        Err(ResourceError::WrongKind { .. })
    ));
}

// --- TUBE RACKS ---

#[test]
fn test_tube_rack_spots_start_empty() {
    let mut tree = ResourceTree::new();
    let prototype = Tube::new(10.8, 10.8, 40.0, 1500.0).with_model("eppendorf_1.5");
    let rack = tree
        .create_tube_rack(
            Resource::new("tubes", 80.0, 60.0, 40.0),
            GridLayout::new(4, 3).with_pitch(18.0, 18.0),
            prototype.clone(),
        )
        .unwrap();

    assert!(matches!(
        tree.get_tube(rack, "B2"),
        Err(ResourceError::Tracker(TrackerError::NoItem { .. }))
    ));

    let spot = tree.get_item_by_name(rack, "B2").unwrap();
    let tube = tree.tube_spot(spot).unwrap().make_tube();
    tree.tube_spot_mut(spot).unwrap().tracker.add(tube).unwrap();
    assert_eq!(tree.get_tube(rack, "B2").unwrap(), prototype);
    assert_eq!(tree.get_occupied_items(rack).unwrap(), vec![spot]);
    assert_eq!(
        tree.resource(spot).unwrap().location(),
        Some(Coordinate::new(18.0, 18.0, 0.0))
    );
}

// --- PLATES ---

#[test]
fn test_plate_with_lid() {
    let mut tree = ResourceTree::new();
    let plate = plate_96(&mut tree, Some(5.0));

    assert!(tree.has_lid(plate).unwrap());
    let lid = tree.get_lid(plate).unwrap().unwrap();
    let node = tree.resource(lid).unwrap();
    assert_eq!(node.name(), "plate_lid");
    assert_eq!(node.location(), Some(Coordinate::new(0.0, 0.0, 9.2)));
    assert_eq!(tree.get_all_items(plate).unwrap().len(), 96);

    let second = tree.insert(Resource::new("spare_lid", 127.76, 85.48, 5.0).with_kind(ResourceKind::Lid));
    assert!(matches!(
        tree.assign_child_resource(plate, second, Coordinate::ZERO),
        Err(ResourceError::PlateHasLid(name)) if name == "plate"
    ));

    // The lid is not a grid item and comes off freely.
    tree.unassign(lid).unwrap();
    assert!(!tree.has_lid(plate).unwrap());
    tree.assign_child_resource(plate, second, Coordinate::new(0.0, 0.0, 9.2))
        .unwrap();
    assert_eq!(tree.get_lid(plate).unwrap(), Some(second));
}

#[test]
fn test_well_volumes_follow_column_major_order() {
    let mut tree = ResourceTree::new();
    let plate = plate_96(&mut tree, None);

    let volumes: Vec<f64> = (0..96).map(f64::from).collect();
    tree.set_well_volumes(plate, &volumes).unwrap();

    let b1 = tree.get_well(plate, "B1").unwrap();
    let a2 = tree.get_well(plate, "A2").unwrap();
    assert_eq!(tree.well(b1).unwrap().tracker.get_used_volume(), 1.0);
    assert_eq!(tree.well(a2).unwrap().tracker.get_used_volume(), 8.0);
    assert_eq!(tree.well(a2).unwrap().max_volume(), 360.0);
    assert_eq!(tree.well(a2).unwrap().bottom_type, WellBottomType::Flat);

    assert!(matches!(
        tree.set_well_volumes(plate, &[1.0, 2.0]),
        Err(ResourceError::PatternMismatch { expected: 96, found: 2, .. })
    ));
    assert!(matches!(
        tree.set_well_volumes(plate, &vec![400.0; 96]),
        Err(ResourceError::Tracker(TrackerError::CapacityExceeded { .. }))
    ));

    let well = tree.well_mut(b1).unwrap();
    well.tracker.add_liquid(Some(Liquid::Water), 10.0).unwrap();
    assert_eq!(well.tracker.get_used_volume(), 11.0);
}

#[test]
fn test_well_capacity_defaults_to_geometry() {
    let mut tree = ResourceTree::new();
    let plate = tree
        .create_plate(
            Resource::new("deep", 127.0, 85.0, 40.0),
            GridLayout::new(12, 8).with_item_size(8.0, 8.0, 10.0),
            WellTemplate {
                cross_section_type: CrossSectionType::Rectangle,
                ..WellTemplate::default()
            },
            None,
        )
        .unwrap();

    let well = tree.get_well(plate, "H12").unwrap();
    let capacity = tree.well(well).unwrap().max_volume();
    assert!((capacity - 640.0).abs() < 1e-3, "{capacity}");
    assert!(!tree.has_lid(plate).unwrap());
}

#[test]
fn test_wells_by_range() {
    let mut tree = ResourceTree::new();
    let plate = plate_96(&mut tree, None);

    let wells = tree.get_wells(plate, "A1:H1").unwrap();
    assert_eq!(wells.len(), 8);
    assert_eq!(tree.name(wells[7]).unwrap(), "plate_H1");
    assert_eq!(tree.resource(wells[7]).unwrap().category(), Some("well"));
    assert_eq!(
        tree.get_absolute_location(wells[7]).unwrap_err().to_string(),
        "resource 'plate' has no location"
    );
}
