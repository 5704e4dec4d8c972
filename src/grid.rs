use std::collections::{HashSet, VecDeque};

use crate::error::GridError;
use crate::types::{Coord, ItemKind, TileKind};

const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tile {
    pub kind: TileKind,
    pub item: Option<ItemKind>,
}

impl Tile {
    pub const fn new(kind: TileKind) -> Self {
        Self { kind, item: None }
    }
}

pub fn decode_tile(code: u16) -> Result<Tile, GridError> {
    let kind_digit = code / 10;
    let item_digit = code % 10;
    let kind = match kind_digit {
        1 => TileKind::Normal,
        2 => TileKind::Wall,
        3 => TileKind::DoorClosed,
        4 => TileKind::DoorOpen,
        5 => TileKind::Ice,
        6 => TileKind::Water,
        digit => return Err(GridError::UnknownKind { code, digit }),
    };
    let item = match item_digit {
        0 => None,
        1 => Some(ItemKind::Flag),
        2 => Some(ItemKind::Sword),
        3 => Some(ItemKind::Shield),
        4 => Some(ItemKind::Mirror),
        5 => Some(ItemKind::Potion),
        6 => Some(ItemKind::Wager),
        digit => return Err(GridError::UnknownItem { code, digit }),
    };
    Ok(Tile { kind, item })
}

pub fn encode_tile(tile: Tile) -> u16 {
    let kind_digit = match tile.kind {
        TileKind::Normal => 1,
        TileKind::Wall => 2,
        TileKind::DoorClosed => 3,
        TileKind::DoorOpen => 4,
        TileKind::Ice => 5,
        TileKind::Water => 6,
    };
    let item_digit = match tile.item {
        None => 0,
        Some(ItemKind::Flag) => 1,
        Some(ItemKind::Sword) => 2,
        Some(ItemKind::Shield) => 3,
        Some(ItemKind::Mirror) => 4,
        Some(ItemKind::Potion) => 5,
        Some(ItemKind::Wager) => 6,
    };
    kind_digit * 10 + item_digit
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grid {
    size: i32,
    tiles: Vec<Tile>,
}

impl Grid {
    pub fn empty(size: i32) -> Self {
        let size = size.max(1);
        Self {
            size,
            tiles: vec![Tile::new(TileKind::Normal); (size * size) as usize],
        }
    }

    pub fn from_codes(rows: &[Vec<u16>]) -> Result<Self, GridError> {
        if rows.is_empty() {
            return Err(GridError::Empty);
        }
        let size = rows.len();
        let mut tiles = Vec::with_capacity(size * size);
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != size {
                return Err(GridError::NotSquare {
                    rows: size,
                    row: row_idx,
                    cols: row.len(),
                });
            }
            for code in row {
                tiles.push(decode_tile(*code)?);
            }
        }
        Ok(Self {
            size: size as i32,
            tiles,
        })
    }

    /// Builds a grid from an ASCII layout, one string per row.
    ///
    /// `.` normal, `#` wall, `D` closed door, `d` open door, `_` ice,
    /// `~` water. Item letters sit on normal tiles: `F` flag, `S` sword,
    /// `H` shield, `M` mirror, `P` potion, `W` wager.
    pub fn parse_ascii(rows: &[&str]) -> Result<Self, GridError> {
        if rows.is_empty() {
            return Err(GridError::Empty);
        }
        let size = rows.len();
        let mut tiles = Vec::with_capacity(size * size);
        for (row_idx, row) in rows.iter().enumerate() {
            let symbols: Vec<char> = row.chars().collect();
            if symbols.len() != size {
                return Err(GridError::NotSquare {
                    rows: size,
                    row: row_idx,
                    cols: symbols.len(),
                });
            }
            for (col_idx, symbol) in symbols.into_iter().enumerate() {
                let tile = match symbol {
                    '.' => Tile::new(TileKind::Normal),
                    '#' => Tile::new(TileKind::Wall),
                    'D' => Tile::new(TileKind::DoorClosed),
                    'd' => Tile::new(TileKind::DoorOpen),
                    '_' => Tile::new(TileKind::Ice),
                    '~' => Tile::new(TileKind::Water),
                    letter => {
                        let item = match letter {
                            'F' => ItemKind::Flag,
                            'S' => ItemKind::Sword,
                            'H' => ItemKind::Shield,
                            'M' => ItemKind::Mirror,
                            'P' => ItemKind::Potion,
                            'W' => ItemKind::Wager,
                            _ => {
                                return Err(GridError::UnknownSymbol {
                                    symbol: letter,
                                    row: row_idx,
                                    col: col_idx,
                                })
                            }
                        };
                        Tile {
                            kind: TileKind::Normal,
                            item: Some(item),
                        }
                    }
                };
                tiles.push(tile);
            }
        }
        Ok(Self {
            size: size as i32,
            tiles,
        })
    }

    pub fn to_codes(&self) -> Vec<Vec<u16>> {
        self.tiles
            .chunks(self.size as usize)
            .map(|row| row.iter().map(|tile| encode_tile(*tile)).collect())
            .collect()
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn in_bounds(&self, coord: Coord) -> bool {
        coord.x >= 0 && coord.y >= 0 && coord.x < self.size && coord.y < self.size
    }

    pub fn key_of(&self, coord: Coord) -> Option<usize> {
        if !self.in_bounds(coord) {
            return None;
        }
        Some((coord.y * self.size + coord.x) as usize)
    }

    pub fn coord_of(&self, key: usize) -> Coord {
        let key = key as i32;
        Coord::new(key % self.size, key / self.size)
    }

    pub fn tile(&self, coord: Coord) -> Option<Tile> {
        self.key_of(coord).map(|key| self.tiles[key])
    }

    pub fn kind(&self, coord: Coord) -> TileKind {
        self.tile(coord)
            .map(|tile| tile.kind)
            .unwrap_or(TileKind::Wall)
    }

    pub fn item(&self, coord: Coord) -> Option<ItemKind> {
        self.tile(coord).and_then(|tile| tile.item)
    }

    pub fn is_ice(&self, coord: Coord) -> bool {
        self.kind(coord) == TileKind::Ice
    }

    pub fn is_closed_door(&self, coord: Coord) -> bool {
        self.kind(coord) == TileKind::DoorClosed
    }

    pub fn tile_cost(&self, coord: Coord, ignore_closed_doors: bool) -> i32 {
        match self.kind(coord) {
            TileKind::Wall => -1,
            TileKind::DoorClosed if ignore_closed_doors => 1,
            TileKind::DoorClosed => -1,
            TileKind::Normal | TileKind::DoorOpen => 1,
            TileKind::Ice => 0,
            TileKind::Water => 2,
        }
    }

    pub fn is_passable(&self, coord: Coord) -> bool {
        self.tile_cost(coord, false) >= 0
    }

    pub fn neighbors(&self, coord: Coord) -> impl Iterator<Item = Coord> + '_ {
        NEIGHBOR_OFFSETS
            .iter()
            .map(move |(dx, dy)| coord.offset(*dx, *dy))
            .filter(move |next| self.in_bounds(*next))
    }

    pub fn adjacent_closed_doors(&self, coord: Coord) -> Vec<Coord> {
        self.neighbors(coord)
            .filter(|next| self.is_closed_door(*next))
            .collect()
    }

    pub fn toggle_door(&mut self, coord: Coord) -> Option<TileKind> {
        let key = self.key_of(coord)?;
        let tile = &mut self.tiles[key];
        tile.kind = match tile.kind {
            TileKind::DoorClosed => TileKind::DoorOpen,
            TileKind::DoorOpen => TileKind::DoorClosed,
            _ => return None,
        };
        Some(tile.kind)
    }

    pub fn set_kind(&mut self, coord: Coord, kind: TileKind) -> bool {
        let Some(key) = self.key_of(coord) else {
            return false;
        };
        self.tiles[key].kind = kind;
        if !self.can_hold_item(coord) {
            self.tiles[key].item = None;
        }
        true
    }

    pub fn can_hold_item(&self, coord: Coord) -> bool {
        matches!(
            self.kind(coord),
            TileKind::Normal | TileKind::Ice | TileKind::Water
        )
    }

    pub fn place_item(&mut self, coord: Coord, item: ItemKind) -> bool {
        if !self.can_hold_item(coord) || self.item(coord).is_some() {
            return false;
        }
        let Some(key) = self.key_of(coord) else {
            return false;
        };
        self.tiles[key].item = Some(item);
        true
    }

    pub fn take_item(&mut self, coord: Coord) -> Option<ItemKind> {
        let key = self.key_of(coord)?;
        self.tiles[key].item.take()
    }

    pub fn flag_position(&self) -> Option<Coord> {
        self.tiles
            .iter()
            .position(|tile| tile.item == Some(ItemKind::Flag))
            .map(|key| self.coord_of(key))
    }

    pub fn item_positions(&self) -> Vec<(Coord, ItemKind)> {
        self.tiles
            .iter()
            .enumerate()
            .filter_map(|(key, tile)| tile.item.map(|item| (self.coord_of(key), item)))
            .collect()
    }

    pub fn nearest_matching<F>(&self, origin: Coord, accept: F) -> Option<Coord>
    where
        F: Fn(Coord, Tile) -> bool,
    {
        let origin_tile = self.tile(origin)?;
        if accept(origin, origin_tile) {
            return Some(origin);
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        seen.insert(origin);
        queue.push_back(origin);
        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(current) {
                if self.tile_cost(next, true) < 0 || !seen.insert(next) {
                    continue;
                }
                if let Some(tile) = self.tile(next) {
                    if accept(next, tile) {
                        return Some(next);
                    }
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Debug rendering in the `parse_ascii` alphabet. An item letter hides
    /// the tile kind under it, so items on ice or water read back on normal
    /// tiles. `to_codes` is the lossless form.
    pub fn to_ascii(&self) -> Vec<String> {
        self.tiles
            .chunks(self.size as usize)
            .map(|row| {
                row.iter()
                    .map(|tile| match (tile.kind, tile.item) {
                        (_, Some(ItemKind::Flag)) => 'F',
                        (_, Some(ItemKind::Sword)) => 'S',
                        (_, Some(ItemKind::Shield)) => 'H',
                        (_, Some(ItemKind::Mirror)) => 'M',
                        (_, Some(ItemKind::Potion)) => 'P',
                        (_, Some(ItemKind::Wager)) => 'W',
                        (TileKind::Normal, None) => '.',
                        (TileKind::Wall, None) => '#',
                        (TileKind::DoorClosed, None) => 'D',
                        (TileKind::DoorOpen, None) => 'd',
                        (TileKind::Ice, None) => '_',
                        (TileKind::Water, None) => '~',
                    })
                    .collect()
            })
            .collect()
    }
}
