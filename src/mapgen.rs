use std::collections::{HashSet, VecDeque};

use crate::grid::Grid;
use crate::rng::GameRng;
use crate::types::{Coord, GameMode, ItemKind, TileKind};

const MIN_SIZE: i32 = 6;
const MAX_SPAWNS: usize = 8;
const WALL_CHANCE: f64 = 0.14;
const PATCH_CHANCE: f64 = 0.03;
const DOOR_CHANCE: f64 = 0.35;
const SPAWN_CLEARANCE: i32 = 2;

const LOOT_CYCLE: [ItemKind; 5] = [
    ItemKind::Sword,
    ItemKind::Shield,
    ItemKind::Potion,
    ItemKind::Mirror,
    ItemKind::Wager,
];

#[derive(Clone, Debug)]
pub struct GeneratedMap {
    pub grid: Grid,
    pub spawns: Vec<Coord>,
}

pub fn generate_map(size: i32, player_count: usize, seed: u64, mode: GameMode) -> GeneratedMap {
    let mut rng = GameRng::new(seed);
    let size = size.max(MIN_SIZE);
    let mut grid = Grid::empty(size);

    for y in 0..size {
        for x in 0..size {
            if rng.chance(WALL_CHANCE) {
                grid.set_kind(Coord::new(x, y), TileKind::Wall);
            }
        }
    }
    for y in 0..size {
        for x in 0..size {
            if !rng.chance(PATCH_CHANCE) {
                continue;
            }
            let kind = if rng.chance(0.5) {
                TileKind::Ice
            } else {
                TileKind::Water
            };
            paint_patch(&mut grid, Coord::new(x, y), kind, &mut rng);
        }
    }
    place_doors(&mut grid, &mut rng);

    let spawns = spawn_points(size, player_count);
    for spawn in &spawns {
        clear_around(&mut grid, *spawn);
    }
    connect_spawns(&mut grid, &spawns);

    let reachable = reachable_from(&grid, spawns.first().copied());
    place_loot(&mut grid, &spawns, &reachable, player_count, mode, &mut rng);

    GeneratedMap { grid, spawns }
}

fn paint_patch(grid: &mut Grid, center: Coord, kind: TileKind, rng: &mut GameRng) {
    for dy in -1..=1 {
        for dx in -1..=1 {
            let at = center.offset(dx, dy);
            if grid.kind(at) != TileKind::Wall && rng.chance(0.7) {
                grid.set_kind(at, kind);
            }
        }
    }
}

fn place_doors(grid: &mut Grid, rng: &mut GameRng) {
    let size = grid.size();
    for y in 0..size {
        for x in 0..size {
            let at = Coord::new(x, y);
            if grid.kind(at) != TileKind::Normal {
                continue;
            }
            let horizontal = grid.kind(at.offset(-1, 0)) == TileKind::Wall
                && grid.kind(at.offset(1, 0)) == TileKind::Wall
                && grid.in_bounds(at.offset(-1, 0))
                && grid.in_bounds(at.offset(1, 0));
            let vertical = grid.kind(at.offset(0, -1)) == TileKind::Wall
                && grid.kind(at.offset(0, 1)) == TileKind::Wall
                && grid.in_bounds(at.offset(0, -1))
                && grid.in_bounds(at.offset(0, 1));
            if (horizontal || vertical) && rng.chance(DOOR_CHANCE) {
                grid.set_kind(at, TileKind::DoorClosed);
            }
        }
    }
}

pub fn spawn_points(size: i32, player_count: usize) -> Vec<Coord> {
    let near = 1;
    let far = size - 2;
    let mid = size / 2;
    let candidates = [
        Coord::new(near, near),
        Coord::new(far, far),
        Coord::new(far, near),
        Coord::new(near, far),
        Coord::new(mid, near),
        Coord::new(mid, far),
        Coord::new(near, mid),
        Coord::new(far, mid),
    ];
    candidates
        .into_iter()
        .take(player_count.clamp(1, MAX_SPAWNS))
        .collect()
}

fn clear_around(grid: &mut Grid, spawn: Coord) {
    for dy in -1..=1 {
        for dx in -1..=1 {
            grid.set_kind(spawn.offset(dx, dy), TileKind::Normal);
        }
    }
}

fn connect_spawns(grid: &mut Grid, spawns: &[Coord]) {
    let Some(primary) = spawns.first().copied() else {
        return;
    };
    for spawn in spawns.iter().skip(1) {
        if reachable_from(grid, Some(primary)).contains(spawn) {
            continue;
        }
        let (mut x, mut y) = (primary.x, primary.y);
        while x != spawn.x {
            x += (spawn.x - x).signum();
            open_tile(grid, Coord::new(x, y));
        }
        while y != spawn.y {
            y += (spawn.y - y).signum();
            open_tile(grid, Coord::new(x, y));
        }
    }
}

fn open_tile(grid: &mut Grid, at: Coord) {
    if grid.kind(at) == TileKind::Wall {
        grid.set_kind(at, TileKind::Normal);
    }
}

pub fn reachable_from(grid: &Grid, start: Option<Coord>) -> HashSet<Coord> {
    let mut out = HashSet::new();
    let Some(start) = start else {
        return out;
    };
    if grid.tile_cost(start, true) < 0 {
        return out;
    }
    let mut queue = VecDeque::new();
    out.insert(start);
    queue.push_back(start);
    while let Some(current) = queue.pop_front() {
        for next in grid.neighbors(current) {
            if grid.tile_cost(next, true) < 0 {
                continue;
            }
            if out.insert(next) {
                queue.push_back(next);
            }
        }
    }
    out
}

fn place_loot(
    grid: &mut Grid,
    spawns: &[Coord],
    reachable: &HashSet<Coord>,
    player_count: usize,
    mode: GameMode,
    rng: &mut GameRng,
) {
    let mut cells: Vec<Coord> = reachable
        .iter()
        .copied()
        .filter(|cell| {
            grid.kind(*cell) == TileKind::Normal
                && spawns
                    .iter()
                    .all(|spawn| spawn.manhattan(*cell) > SPAWN_CLEARANCE)
        })
        .collect();
    cells.sort();

    if mode == GameMode::CaptureTheFlag {
        let center = Coord::new(grid.size() / 2, grid.size() / 2);
        let flag = cells
            .iter()
            .enumerate()
            .min_by_key(|(_, cell)| (cell.manhattan(center), cell.y, cell.x))
            .map(|(idx, _)| idx);
        if let Some(idx) = flag {
            let cell = cells.swap_remove(idx);
            grid.place_item(cell, ItemKind::Flag);
        }
    }

    let count = player_count.max(2) + 2;
    for item in LOOT_CYCLE.iter().cycle().take(count) {
        if cells.is_empty() {
            break;
        }
        let idx = rng.pick_index(cells.len());
        let cell = cells.swap_remove(idx);
        grid.place_item(cell, *item);
    }
}
