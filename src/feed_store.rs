use crate::csv_reader::{Record, read_table};
use anyhow::{Result, bail};
use compact_str::CompactString;
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

pub const ROUTES_FILE: &str = "routes.txt";
pub const TRIPS_FILE: &str = "trips.txt";
pub const SHAPES_FILE: &str = "shapes.txt";

const DEFAULT_ROUTE_COLOR: &str = "#000000";
const DEFAULT_ROUTE_TEXT_COLOR: &str = "#FFFFFF";

// Sorts after every well-formed sequence number
const MALFORMED_SEQUENCE: i64 = i64::MAX;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub id: CompactString,
    pub short_name: CompactString,
    pub long_name: CompactString,
    pub color: CompactString,
    pub text_color: CompactString,
}

impl Route {
    fn from_record(record: &Record) -> Self {
        Self {
            id: record.get("route_id").into(),
            short_name: record.get("route_short_name").into(),
            long_name: record.get("route_long_name").into(),
            color: record
                .get_non_empty("route_color")
                .unwrap_or(DEFAULT_ROUTE_COLOR)
                .into(),
            text_color: record
                .get_non_empty("route_text_color")
                .unwrap_or(DEFAULT_ROUTE_TEXT_COLOR)
                .into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: CompactString,
    pub route_id: CompactString,
    pub shape_id: Option<CompactString>,
    pub direction: CompactString,
    pub headsign: CompactString,
}

impl Trip {
    fn from_record(record: &Record) -> Self {
        Self {
            id: record.get("trip_id").into(),
            route_id: record.get("route_id").into(),
            shape_id: record.get_non_empty("shape_id").map(CompactString::from),
            direction: record.get("direction_id").into(),
            headsign: record.get("trip_headsign").into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapePoint {
    pub lat: f64,
    pub lon: f64,
    pub sequence: i64,
}

impl ShapePoint {
    /// Unparseable coordinates become NaN and an unparseable sequence sorts last.
    /// The flag tells whether any of the three fields was malformed.
    fn from_record(record: &Record) -> (Self, bool) {
        let lat = record.parse_f64("shape_pt_lat");
        let lon = record.parse_f64("shape_pt_lon");
        let sequence = record.parse_i64("shape_pt_sequence");
        let malformed = lat.is_none() || lon.is_none() || sequence.is_none();

        let point = Self {
            lat: lat.unwrap_or(f64::NAN),
            lon: lon.unwrap_or(f64::NAN),
            sequence: sequence.unwrap_or(MALFORMED_SEQUENCE),
        };
        (point, malformed)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadStats {
    pub routes: usize,
    pub trips: usize,
    pub shapes: usize,
    pub shape_points: usize,
    pub malformed_points: usize,
    pub unreadable_tables: Vec<&'static str>,
}

/// Routes, trips and shapes of one feed. Built once, read-only afterwards.
#[derive(Debug, Default)]
pub struct FeedStore {
    routes: HashMap<CompactString, Route>,
    // first-insertion order of route ids
    route_order: Vec<CompactString>,
    trips: HashMap<CompactString, Trip>,
    shapes: HashMap<CompactString, Vec<ShapePoint>>,
    // route id -> trip ids in load order, duplicates included
    route_trips: HashMap<CompactString, Vec<CompactString>>,
    shape_points: usize,
    malformed_points: usize,
    unreadable_tables: Vec<&'static str>,
}

impl FeedStore {
    /// Reads the three tables from `data_dir`. A table that cannot be read is
    /// logged and loaded as empty; only a missing directory fails the load.
    pub fn load(data_dir: &Path) -> Result<Self> {
        if !data_dir.is_dir() {
            bail!("GTFS data directory {} does not exist", data_dir.display());
        }
        info!("Loading GTFS data from {}...", data_dir.display());

        let mut unreadable_tables = Vec::new();
        let mut read = |file: &'static str| {
            read_table(&data_dir.join(file)).unwrap_or_else(|| {
                unreadable_tables.push(file);
                Vec::new()
            })
        };
        let routes = read(ROUTES_FILE);
        let trips = read(TRIPS_FILE);
        let shapes = read(SHAPES_FILE);

        let mut store = Self::from_records(&routes, &trips, &shapes);
        store.unreadable_tables = unreadable_tables;
        Ok(store)
    }

    /// Empty store standing in for a load that failed as a whole: every table counts as unread.
    pub fn unloaded() -> Self {
        Self {
            unreadable_tables: vec![ROUTES_FILE, TRIPS_FILE, SHAPES_FILE],
            ..Self::default()
        }
    }

    pub fn from_records(routes: &[Record], trips: &[Record], shapes: &[Record]) -> Self {
        let mut store = Self::default();

        // Routes: the last row for an id wins, position stays where it was first seen
        for record in routes {
            let route = Route::from_record(record);
            if store.routes.insert(route.id.clone(), route.clone()).is_none() {
                store.route_order.push(route.id);
            }
        }

        // Trips: every row is indexed, but the first row for an id wins
        for record in trips {
            let trip = Trip::from_record(record);
            store
                .route_trips
                .entry(trip.route_id.clone())
                .or_default()
                .push(trip.id.clone());
            store.trips.entry(trip.id.clone()).or_insert(trip);
        }

        for record in shapes {
            let (point, malformed) = ShapePoint::from_record(record);
            if malformed {
                store.malformed_points += 1;
            }
            store
                .shapes
                .entry(record.get("shape_id").into())
                .or_default()
                .push(point);
            store.shape_points += 1;
        }
        for points in store.shapes.values_mut() {
            points.sort_by_key(|p| p.sequence);
        }

        if store.malformed_points > 0 {
            warn!(
                "{} shape points had unparseable coordinates or sequence numbers",
                store.malformed_points
            );
        }
        info!(
            "Loaded {} routes, {} trips, {} shapes",
            store.routes.len(),
            store.trips.len(),
            store.shapes.len()
        );

        store
    }

    pub fn route(&self, route_id: &str) -> Option<&Route> {
        self.routes.get(route_id)
    }

    /// Routes in the order their ids first appeared in the routes table.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.route_order.iter().filter_map(|id| self.routes.get(id))
    }

    pub fn trip(&self, trip_id: &str) -> Option<&Trip> {
        self.trips.get(trip_id)
    }

    pub fn shape(&self, shape_id: &str) -> Option<&[ShapePoint]> {
        self.shapes.get(shape_id).map(Vec::as_slice)
    }

    pub fn route_trip_ids(&self, route_id: &str) -> &[CompactString] {
        self.route_trips
            .get(route_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The first trip listed for the route in the trips table.
    pub fn representative_trip(&self, route_id: &str) -> Option<&Trip> {
        self.route_trip_ids(route_id)
            .first()
            .and_then(|trip_id| self.trip(trip_id))
    }

    /// Shape of the representative trip, if it names one that was loaded.
    pub fn representative_shape(&self, route_id: &str) -> Option<&[ShapePoint]> {
        let shape_id = self.representative_trip(route_id)?.shape_id.as_ref()?;
        self.shape(shape_id)
    }

    pub fn stats(&self) -> LoadStats {
        LoadStats {
            routes: self.routes.len(),
            trips: self.trips.len(),
            shapes: self.shapes.len(),
            shape_points: self.shape_points,
            malformed_points: self.malformed_points,
            unreadable_tables: self.unreadable_tables.clone(),
        }
    }
}
