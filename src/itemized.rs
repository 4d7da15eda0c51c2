//! Itemized resources: tip racks, tube racks and plates holding a fixed grid of spots.
//!
//! # Addressing
//!
//! Rows are lettered from `A` (row 0, the back row, highest y) and columns
//! numbered from `1`, so `"C4"` is row 2, column 3. Rows past `Z` continue with
//! `AA`, `AB`, ... .
//!
//! Linear indices are column-major: `index = column * num_items_y + row`. Every
//! bulk operation iterates in this order, which is also the order the spots are
//! created and serialized in. A range such as `"A1:B3"` expands to the rectangle
//! it spans, in the same order.

use crate::coordinate::Coordinate;
use crate::error::{ResourceError, Result};
use crate::resource::{Resource, ResourceId, ResourceKind, ResourceTree};
use crate::tip::{Tip, TipSpot};
use crate::tube::{Tube, TubeSpot};
use crate::well::{CrossSectionType, Well, WellBottomType, compute_max_volume};
use tracing::debug;

/// The spots of an itemized resource, in column-major order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    num_items_x: usize,
    num_items_y: usize,
    items: Vec<ResourceId>,
}

impl Grid {
    /// An empty grid of `num_items_x` columns and `num_items_y` rows.
    pub fn new(num_items_x: usize, num_items_y: usize) -> Self {
        Self {
            num_items_x,
            num_items_y,
            items: Vec::with_capacity(num_items_x * num_items_y),
        }
    }

    pub(crate) fn with_items(num_items_x: usize, num_items_y: usize, items: Vec<ResourceId>) -> Self {
        Self {
            num_items_x,
            num_items_y,
            items,
        }
    }

    /// Number of columns.
    pub fn num_items_x(&self) -> usize {
        self.num_items_x
    }

    /// Number of rows.
    pub fn num_items_y(&self) -> usize {
        self.num_items_y
    }

    pub fn num_items(&self) -> usize {
        self.num_items_x * self.num_items_y
    }

    pub fn items(&self) -> &[ResourceId] {
        &self.items
    }

    /// Linear index of a cell, if it is inside the grid.
    pub fn index_of(&self, row: usize, column: usize) -> Option<usize> {
        (row < self.num_items_y && column < self.num_items_x)
            .then_some(column * self.num_items_y + row)
    }

    /// `(row, column)` of a linear index, if it is inside the grid.
    pub fn position_of(&self, index: usize) -> Option<(usize, usize)> {
        (index < self.num_items() && self.num_items_y > 0)
            .then(|| (index % self.num_items_y, index / self.num_items_y))
    }
}

/// Which itemized kind to build, and with it the spot kind it holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridKind {
    TipRack,
    TubeRack,
    Plate,
}

impl GridKind {
    pub fn of(kind: &ResourceKind) -> Option<Self> {
        match kind {
            ResourceKind::TipRack(_) => Some(Self::TipRack),
            ResourceKind::TubeRack(_) => Some(Self::TubeRack),
            ResourceKind::Plate(_) => Some(Self::Plate),
            _ => None,
        }
    }

    pub(crate) fn with_grid(self, grid: Grid) -> ResourceKind {
        match self {
            Self::TipRack => ResourceKind::TipRack(grid),
            Self::TubeRack => ResourceKind::TubeRack(grid),
            Self::Plate => ResourceKind::Plate(grid),
        }
    }

    /// Whether `kind` is the spot kind this grid holds.
    pub fn holds(self, kind: &ResourceKind) -> bool {
        matches!(
            (self, kind),
            (Self::TipRack, ResourceKind::TipSpot(_))
                | (Self::TubeRack, ResourceKind::TubeSpot(_))
                | (Self::Plate, ResourceKind::Well(_))
        )
    }

    fn label(self) -> &'static str {
        match self {
            Self::TipRack => "tip rack",
            Self::TubeRack => "tube rack",
            Self::Plate => "plate",
        }
    }

    fn spot_category(self) -> &'static str {
        match self {
            Self::TipRack => "tip_spot",
            Self::TubeRack => "tube_spot",
            Self::Plate => "well",
        }
    }
}

/// Placement of the spots of an itemized resource.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    /// Number of columns.
    pub num_items_x: usize,
    /// Number of rows.
    pub num_items_y: usize,
    /// Offset of the front-left spot (the last row of the first column) from the rack origin.
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    /// Distance between neighbouring columns.
    pub item_dx: f64,
    /// Distance between neighbouring rows.
    pub item_dy: f64,
    /// Size of each spot.
    pub item_size_x: f64,
    pub item_size_y: f64,
    pub item_size_z: f64,
}

impl GridLayout {
    /// A grid on the standard 9 mm microplate pitch, with spots filling the pitch.
    pub fn new(num_items_x: usize, num_items_y: usize) -> Self {
        Self {
            num_items_x,
            num_items_y,
            dx: 0.0,
            dy: 0.0,
            dz: 0.0,
            item_dx: 9.0,
            item_dy: 9.0,
            item_size_x: 9.0,
            item_size_y: 9.0,
            item_size_z: 0.0,
        }
    }

    pub fn with_offset(mut self, dx: f64, dy: f64, dz: f64) -> Self {
        self.dx = dx;
        self.dy = dy;
        self.dz = dz;
        self
    }

    pub fn with_pitch(mut self, item_dx: f64, item_dy: f64) -> Self {
        self.item_dx = item_dx;
        self.item_dy = item_dy;
        self
    }

    pub fn with_item_size(mut self, size_x: f64, size_y: f64, size_z: f64) -> Self {
        self.item_size_x = size_x;
        self.item_size_y = size_y;
        self.item_size_z = size_z;
        self
    }

    /// Location of a spot relative to the rack. Row 0 is the back row.
    pub fn location_of(&self, row: usize, column: usize) -> Coordinate {
        let from_front = self.num_items_y.saturating_sub(1 + row);
        Coordinate::new(
            self.dx + column as f64 * self.item_dx,
            self.dy + from_front as f64 * self.item_dy,
            self.dz,
        )
    }
}

/// The letters of a row: `A` for 0, `Z` for 25, `AA` for 26.
pub fn row_label(row: usize) -> String {
    let mut letters = Vec::new();
    let mut n = row + 1;
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// The name of a cell, `"A1"` for row 0, column 0.
pub fn spot_label(row: usize, column: usize) -> String {
    format!("{}{}", row_label(row), column + 1)
}

/// Parses a cell name such as `"C4"` into `(row, column)`. Letters are case-insensitive.
pub fn parse_spot_label(label: &str) -> Option<(usize, usize)> {
    let split = label.find(|c: char| !c.is_ascii_alphabetic())?;
    let (letters, digits) = label.split_at(split);
    if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut n: usize = 0;
    for byte in letters.bytes() {
        let value = usize::from(byte.to_ascii_uppercase() - b'A') + 1;
        n = n.checked_mul(26)?.checked_add(value)?;
    }
    let column: usize = digits.parse().ok()?;
    Some((n - 1, column.checked_sub(1)?))
}

/// Initial tip occupancy for [`ResourceTree::set_tip_state`].
#[derive(Clone, Debug, PartialEq)]
pub enum TipPattern {
    /// One flag per cell, indexed `[row][column]`.
    Grid(Vec<Vec<bool>>),
    /// Cells in these ranges have a tip, all others are empty.
    Range(String),
}

impl From<Vec<Vec<bool>>> for TipPattern {
    fn from(grid: Vec<Vec<bool>>) -> Self {
        Self::Grid(grid)
    }
}

impl From<&str> for TipPattern {
    fn from(range: &str) -> Self {
        Self::Range(range.to_string())
    }
}

/// Shape and capacity of the wells of a plate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WellTemplate {
    pub bottom_type: WellBottomType,
    pub cross_section_type: CrossSectionType,
    /// Capacity in uL; computed from the spot size when absent.
    pub max_volume: Option<f64>,
}

impl ResourceTree {
    // --- CONSTRUCTION ---

    /// Inserts `resource` as an itemized resource with one spot per cell of `layout`.
    ///
    /// Spots are created in column-major order, named `<rack>_<cell>` (for
    /// example `rack_A1`), with the kind returned by `make_spot` for that name.
    pub fn create_itemized(
        &mut self,
        resource: Resource,
        kind: GridKind,
        layout: GridLayout,
        mut make_spot: impl FnMut(&str) -> ResourceKind,
    ) -> Result<ResourceId> {
        let grid = Grid::new(layout.num_items_x, layout.num_items_y);
        let rack_name = resource.name().to_string();
        let rack = self.insert(resource.with_kind(kind.with_grid(grid)));

        for column in 0..layout.num_items_x {
            for row in 0..layout.num_items_y {
                let name = format!("{rack_name}_{}", spot_label(row, column));
                let spot_kind = make_spot(&name);
                let spot = Resource::new(
                    name,
                    layout.item_size_x,
                    layout.item_size_y,
                    layout.item_size_z,
                )
                .with_category(kind.spot_category())
                .with_kind(spot_kind);
                let spot = self.insert(spot);
                if let Err(err) =
                    self.assign_child_resource(rack, spot, layout.location_of(row, column))
                {
                    self.remove(spot)?;
                    self.remove(rack)?;
                    return Err(err);
                }
                if let Some(grid) = self.resource_mut(rack)?.kind.grid_mut() {
                    grid.items.push(spot);
                }
            }
        }
        debug!(
            rack = %rack_name,
            kind = kind.label(),
            num_items_x = layout.num_items_x,
            num_items_y = layout.num_items_y,
            "created itemized resource"
        );
        Ok(rack)
    }

    /// Creates a tip rack whose spots hold tips like `prototype`.
    pub fn create_tip_rack(
        &mut self,
        resource: Resource,
        layout: GridLayout,
        prototype: Tip,
        with_tips: bool,
    ) -> Result<ResourceId> {
        self.create_itemized(resource, GridKind::TipRack, layout, |name| {
            ResourceKind::TipSpot(TipSpot::new(name, prototype.clone(), with_tips))
        })
    }

    /// Creates a tube rack with empty spots for tubes like `prototype`.
    pub fn create_tube_rack(
        &mut self,
        resource: Resource,
        layout: GridLayout,
        prototype: Tube,
    ) -> Result<ResourceId> {
        self.create_itemized(resource, GridKind::TubeRack, layout, |name| {
            ResourceKind::TubeSpot(TubeSpot::new(name, prototype.clone()))
        })
    }

    /// Creates a plate of empty wells, with a lid of `lid_height` mm on top when given.
    pub fn create_plate(
        &mut self,
        resource: Resource,
        layout: GridLayout,
        well: WellTemplate,
        lid_height: Option<f64>,
    ) -> Result<ResourceId> {
        let max_volume = well.max_volume.unwrap_or_else(|| {
            compute_max_volume(
                layout.item_size_x,
                layout.item_size_y,
                layout.item_size_z,
                well.cross_section_type,
            )
        });
        let plate = self.create_itemized(resource, GridKind::Plate, layout, |name| {
            ResourceKind::Well(Well::new(
                name,
                max_volume,
                well.bottom_type,
                well.cross_section_type,
            ))
        })?;

        if let Some(lid_height) = lid_height {
            let node = self.resource(plate)?;
            let lid = Resource::new(
                format!("{}_lid", node.name()),
                node.size_x(),
                node.size_y(),
                lid_height,
            )
            .with_category("lid")
            .with_kind(ResourceKind::Lid);
            let location = Coordinate::new(0.0, 0.0, node.get_size_z() - lid_height);
            let lid = self.insert(lid);
            self.assign_child_resource(plate, lid, location)?;
        }
        Ok(plate)
    }

    // --- LOOKUP ---

    fn grid_of(&self, id: ResourceId, expected: Option<GridKind>) -> Result<&Grid> {
        let node = self.resource(id)?;
        let matches = match expected {
            Some(expected) => GridKind::of(&node.kind) == Some(expected),
            None => node.kind.grid().is_some(),
        };
        match node.kind.grid() {
            Some(grid) if matches => Ok(grid),
            _ => Err(ResourceError::WrongKind {
                name: node.name().to_string(),
                expected: expected.map_or("itemized resource", GridKind::label),
            }),
        }
    }

    /// The spot at linear (column-major) `index`.
    pub fn get_item(&self, id: ResourceId, index: usize) -> Result<ResourceId> {
        let grid = self.grid_of(id, None)?;
        grid.items
            .get(index)
            .copied()
            .ok_or_else(|| ResourceError::IndexOutOfRange {
                resource: self.name(id).map(str::to_string).unwrap_or_default(),
                index,
                len: grid.items.len(),
            })
    }

    /// The spot at zero-based `row` and `column`.
    pub fn get_item_at(&self, id: ResourceId, row: usize, column: usize) -> Result<ResourceId> {
        let grid = self.grid_of(id, None)?;
        let index = grid
            .index_of(row, column)
            .ok_or_else(|| self.no_such_spot(id, format!("({row}, {column})")))?;
        self.get_item(id, index)
    }

    /// The spot named by a cell such as `"C4"`.
    pub fn get_item_by_name(&self, id: ResourceId, identifier: &str) -> Result<ResourceId> {
        let grid = self.grid_of(id, None)?;
        let index = parse_spot_label(identifier.trim())
            .and_then(|(row, column)| grid.index_of(row, column))
            .ok_or_else(|| self.no_such_spot(id, identifier.to_string()))?;
        self.get_item(id, index)
    }

    /// The spots in a range such as `"A1:B3"`, or several separated by commas (`"A1:A3,C1"`).
    pub fn get_items_by_range(&self, id: ResourceId, range: &str) -> Result<Vec<ResourceId>> {
        let grid = self.grid_of(id, None)?;
        let mut indices = Vec::new();
        for segment in range.split(',').map(str::trim) {
            let cells = match segment.split_once(':') {
                Some((start, end)) => parse_spot_label(start.trim()).zip(parse_spot_label(end.trim())),
                None => parse_spot_label(segment).map(|cell| (cell, cell)),
            };
            let ((row_a, col_a), (row_b, col_b)) =
                cells.ok_or_else(|| self.no_such_spot(id, segment.to_string()))?;
            let (rows, columns) = (row_a.min(row_b)..=row_a.max(row_b), col_a.min(col_b)..=col_a.max(col_b));
            for column in columns {
                for row in rows.clone() {
                    let index = grid
                        .index_of(row, column)
                        .ok_or_else(|| self.no_such_spot(id, segment.to_string()))?;
                    indices.push(index);
                }
            }
        }
        self.get_items(id, &indices)
    }

    pub fn get_items(&self, id: ResourceId, indices: &[usize]) -> Result<Vec<ResourceId>> {
        indices.iter().map(|&index| self.get_item(id, index)).collect()
    }

    /// Every spot, in column-major order.
    pub fn get_all_items(&self, id: ResourceId) -> Result<Vec<ResourceId>> {
        Ok(self.grid_of(id, None)?.items.clone())
    }

    /// Spots whose tracker holds something, including staged changes.
    pub fn get_occupied_items(&self, id: ResourceId) -> Result<Vec<ResourceId>> {
        let mut occupied = Vec::new();
        for spot in self.get_all_items(id)? {
            if self.tracker(spot)?.is_occupied() {
                occupied.push(spot);
            }
        }
        Ok(occupied)
    }

    pub fn disable_trackers(&mut self, id: ResourceId) -> Result<()> {
        for spot in self.get_all_items(id)? {
            self.tracker_mut(spot)?.disable();
        }
        Ok(())
    }

    pub fn enable_trackers(&mut self, id: ResourceId) -> Result<()> {
        for spot in self.get_all_items(id)? {
            self.tracker_mut(spot)?.enable();
        }
        Ok(())
    }

    fn no_such_spot(&self, id: ResourceId, identifier: String) -> ResourceError {
        ResourceError::NoSuchSpot {
            resource: self.name(id).map(str::to_string).unwrap_or_default(),
            identifier,
        }
    }

    // --- TIP RACKS ---

    /// The tip in the spot named `identifier`.
    pub fn get_tip(&self, rack: ResourceId, identifier: &str) -> Result<Tip> {
        self.grid_of(rack, Some(GridKind::TipRack))?;
        let spot = self.get_item_by_name(rack, identifier)?;
        Ok(self.tip_spot(spot)?.get_tip()?)
    }

    pub fn get_tips(&self, rack: ResourceId, range: &str) -> Result<Vec<Tip>> {
        self.grid_of(rack, Some(GridKind::TipRack))?;
        self.get_items_by_range(rack, range)?
            .into_iter()
            .map(|spot| Ok(self.tip_spot(spot)?.get_tip()?))
            .collect()
    }

    /// Every tip, in column-major order. Fails on an empty spot with an enabled tracker.
    pub fn get_all_tips(&self, rack: ResourceId) -> Result<Vec<Tip>> {
        self.grid_of(rack, Some(GridKind::TipRack))?;
        self.get_all_items(rack)?
            .into_iter()
            .map(|spot| Ok(self.tip_spot(spot)?.get_tip()?))
            .collect()
    }

    /// Sets which spots hold a tip, bypassing the trackers' transactions.
    ///
    /// ```ignore
    /// tree.set_tip_state(rack, "A7:H12")?;
    /// tree.set_tip_state(rack, vec![vec![true; 12]; 8])?;
    /// ```
    pub fn set_tip_state(&mut self, rack: ResourceId, pattern: impl Into<TipPattern>) -> Result<()> {
        let grid = self.grid_of(rack, Some(GridKind::TipRack))?;
        let mut has_tip = vec![false; grid.num_items()];
        match pattern.into() {
            TipPattern::Grid(rows) => {
                let found = rows.iter().map(Vec::len).sum();
                let well_formed = rows.len() == grid.num_items_y
                    && rows.iter().all(|row| row.len() == grid.num_items_x);
                if !well_formed {
                    return Err(ResourceError::PatternMismatch {
                        resource: self.name(rack)?.to_string(),
                        expected: grid.num_items(),
                        found,
                    });
                }
                for (row, flags) in rows.iter().enumerate() {
                    for (column, &flag) in flags.iter().enumerate() {
                        if let Some(index) = grid.index_of(row, column) {
                            has_tip[index] = flag;
                        }
                    }
                }
            }
            TipPattern::Range(range) => {
                let items = grid.items.clone();
                for spot in self.get_items_by_range(rack, &range)? {
                    if let Some(index) = items.iter().position(|&item| item == spot) {
                        has_tip[index] = true;
                    }
                }
            }
        }

        for (spot, flag) in self.get_all_items(rack)?.into_iter().zip(has_tip) {
            let spot = self.tip_spot_mut(spot)?;
            if flag && !spot.has_tip() {
                spot.fill();
            } else if !flag && spot.has_tip() {
                spot.empty();
            }
        }
        Ok(())
    }

    pub fn fill_tip_rack(&mut self, rack: ResourceId) -> Result<()> {
        let grid = self.grid_of(rack, Some(GridKind::TipRack))?;
        let pattern = vec![vec![true; grid.num_items_x]; grid.num_items_y];
        self.set_tip_state(rack, pattern)
    }

    pub fn empty_tip_rack(&mut self, rack: ResourceId) -> Result<()> {
        let grid = self.grid_of(rack, Some(GridKind::TipRack))?;
        let pattern = vec![vec![false; grid.num_items_x]; grid.num_items_y];
        self.set_tip_state(rack, pattern)
    }

    // --- TUBE RACKS ---

    /// The tube in the spot named `identifier`.
    pub fn get_tube(&self, rack: ResourceId, identifier: &str) -> Result<Tube> {
        self.grid_of(rack, Some(GridKind::TubeRack))?;
        let spot = self.get_item_by_name(rack, identifier)?;
        Ok(self.tube_spot(spot)?.get_tube()?.clone())
    }

    // --- PLATES ---

    /// The well named `identifier`, such as `"A1"`.
    pub fn get_well(&self, plate: ResourceId, identifier: &str) -> Result<ResourceId> {
        self.grid_of(plate, Some(GridKind::Plate))?;
        self.get_item_by_name(plate, identifier)
    }

    pub fn get_wells(&self, plate: ResourceId, range: &str) -> Result<Vec<ResourceId>> {
        self.grid_of(plate, Some(GridKind::Plate))?;
        self.get_items_by_range(plate, range)
    }

    /// Sets the liquid volume of every well, one entry per well in column-major
    /// order (that is, the columns of the plate one after another).
    pub fn set_well_volumes(&mut self, plate: ResourceId, volumes: &[f64]) -> Result<()> {
        let wells = self.grid_of(plate, Some(GridKind::Plate))?.items.clone();
        if volumes.len() != wells.len() {
            return Err(ResourceError::PatternMismatch {
                resource: self.name(plate)?.to_string(),
                expected: wells.len(),
                found: volumes.len(),
            });
        }
        for (well, &volume) in wells.into_iter().zip(volumes) {
            self.well_mut(well)?.set_liquid_volume(volume)?;
        }
        Ok(())
    }

    pub fn has_lid(&self, plate: ResourceId) -> Result<bool> {
        Ok(self.get_lid(plate)?.is_some())
    }

    pub fn get_lid(&self, plate: ResourceId) -> Result<Option<ResourceId>> {
        self.grid_of(plate, Some(GridKind::Plate))?;
        Ok(self
            .resource(plate)?
            .children()
            .iter()
            .copied()
            .find(|&child| matches!(self.kind(child), Ok(ResourceKind::Lid))))
    }
}
