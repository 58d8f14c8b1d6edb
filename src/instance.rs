//! Module for parsing and representing CVRP instances.
//!
//! This module handles the TSP-LIB style format used for CVRP benchmark
//! files (`.vrp`). An instance is a complete undirected graph on `n`
//! nodes with per-node coordinates and demands, a fleet of identical
//! vehicles, and a dense symmetric cost matrix derived from the
//! coordinates by the metric selected in the file header.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A 2-D point; equality is component-wise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Metric used to derive edge costs from coordinates.
pub type Metric = fn(Point, Point) -> f64;

fn euclidean(a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dx * dx + dy * dy).sqrt()
}

/// Registry of edge-weight types the loader understands.
///
/// Keys match the `EDGE_WEIGHT_TYPE` header values of instance files.
pub fn metric_registry() -> HashMap<&'static str, Metric> {
    let mut registry: HashMap<&'static str, Metric> = HashMap::new();
    registry.insert("EUC_2D", euclidean);
    registry
}

/// Represents a node in a CVRP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier (1-indexed in files, 0-indexed internally)
    pub id: usize,
    /// Node coordinates
    pub point: Point,
    /// Demand; the depot has demand 0
    pub demand: u32,
}

impl Node {
    pub fn new(id: usize, x: f64, y: f64, demand: u32) -> Self {
        Node {
            id,
            point: Point::new(x, y),
            demand,
        }
    }

    /// Check if this node is the depot
    pub fn is_depot(&self) -> bool {
        self.id == 0
    }
}

/// Fleet descriptor: number of identical vehicles and their capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Fleet {
    pub vehicles: usize,
    pub capacity: u32,
}

impl Fleet {
    pub fn new(vehicles: usize, capacity: u32) -> Self {
        Fleet {
            vehicles,
            capacity,
        }
    }
}

/// Represents a complete CVRP instance.
///
/// Instances are immutable after construction: the cost matrix is
/// computed once from the coordinates and treated as read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvrpInstance {
    /// Name of the instance
    pub name: String,
    /// Comment/description
    pub comment: String,
    /// Number of nodes (including depot)
    pub dimension: usize,
    /// Fleet descriptor
    pub fleet: Fleet,
    /// List of all nodes; node 0 is the depot
    pub nodes: Vec<Node>,
    /// Edge weight type key used to build the cost matrix
    pub edge_weight_type: String,
    /// Precomputed symmetric cost matrix
    #[serde(skip)]
    cost_matrix: Vec<Vec<f64>>,
}

impl CvrpInstance {
    /// Build an instance from its parts, memoizing all pair costs.
    pub fn new(name: &str, nodes: Vec<Node>, fleet: Fleet, metric: Metric) -> Self {
        let cost_matrix = Self::compute_cost_matrix(&nodes, metric);
        CvrpInstance {
            name: name.to_string(),
            comment: String::new(),
            dimension: nodes.len(),
            fleet,
            nodes,
            edge_weight_type: "EUC_2D".to_string(),
            cost_matrix,
        }
    }

    /// Parse a CVRP instance from a TSP-LIB style file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let file = File::open(&path).map_err(|e| format!("Cannot open file: {}", e))?;
        Self::parse(BufReader::new(file))
    }

    /// Parse an instance from any buffered reader.
    ///
    /// Header lines are `KEY : VALUE` with tolerant spacing; sections
    /// run until the next section header or `EOF`. The fleet size is
    /// read from the `No of trucks` fragment of the comment line.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, String> {
        let mut name = String::new();
        let mut comment = String::new();
        let mut dimension = 0usize;
        let mut capacity = 0u32;
        let mut vehicles = 0usize;
        let mut edge_weight_type = String::from("EUC_2D");
        let mut coords: Vec<(usize, f64, f64)> = Vec::new();
        let mut demands: Vec<(usize, u32)> = Vec::new();

        let mut section = Section::Header;

        for line in reader.lines() {
            let line = line.map_err(|e| format!("Read error: {}", e))?;
            let line = line.trim();

            if line.is_empty() || line == "EOF" {
                continue;
            }

            if line.starts_with("NODE_COORD_SECTION") {
                section = Section::Coords;
                continue;
            }
            if line.starts_with("DEMAND_SECTION") {
                section = Section::Demands;
                continue;
            }
            if line.starts_with("DEPOT_SECTION") {
                section = Section::Depot;
                continue;
            }
            // Sections this parser does not consume (TVRP extensions)
            // still terminate the current one.
            if line.ends_with("_SECTION") {
                section = Section::Other;
                continue;
            }

            match section {
                Section::Header => {
                    let (key, value) = match line.split_once(':') {
                        Some((k, v)) => (k.trim(), v.trim()),
                        None => continue,
                    };
                    match key {
                        "NAME" => name = value.to_string(),
                        "COMMENT" => {
                            comment = value.to_string();
                            if let Some(k) = parse_truck_count(value) {
                                vehicles = k;
                            }
                        }
                        "DIMENSION" => {
                            dimension = value
                                .parse()
                                .map_err(|_| format!("Invalid dimension: {}", value))?;
                        }
                        "CAPACITY" => {
                            capacity = value
                                .parse()
                                .map_err(|_| format!("Invalid capacity: {}", value))?;
                        }
                        "EDGE_WEIGHT_TYPE" => edge_weight_type = value.to_string(),
                        _ => {}
                    }
                }
                Section::Coords => {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    if parts.len() >= 3 {
                        let id: usize = parts[0]
                            .parse()
                            .map_err(|_| format!("Invalid node id: {}", parts[0]))?;
                        let x: f64 = parts[1]
                            .parse()
                            .map_err(|_| format!("Invalid x coordinate: {}", parts[1]))?;
                        let y: f64 = parts[2]
                            .parse()
                            .map_err(|_| format!("Invalid y coordinate: {}", parts[2]))?;
                        coords.push((id, x, y));
                    }
                }
                Section::Demands => {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    if parts.len() >= 2 {
                        let id: usize = parts[0]
                            .parse()
                            .map_err(|_| format!("Invalid node id: {}", parts[0]))?;
                        let demand: u32 = parts[1]
                            .parse()
                            .map_err(|_| format!("Invalid demand: {}", parts[1]))?;
                        demands.push((id, demand));
                    }
                }
                Section::Depot | Section::Other => {}
            }
        }

        if dimension == 0 {
            return Err("Missing or zero DIMENSION".to_string());
        }
        if coords.len() != dimension {
            return Err(format!(
                "Expected {} coordinate lines, found {}",
                dimension,
                coords.len()
            ));
        }

        if vehicles == 0 {
            // Fall back on the `-k<K>` suffix convention of instance names
            vehicles = parse_trucks_from_name(&name).unwrap_or(1);
            log::warn!(
                "No truck count in comment; assuming {} vehicle(s)",
                vehicles
            );
        }

        let registry = metric_registry();
        let metric = *registry
            .get(edge_weight_type.as_str())
            .ok_or_else(|| format!("Unsupported edge weight type: {}", edge_weight_type))?;

        let mut nodes = Vec::with_capacity(dimension);
        for &(id, x, y) in &coords {
            let demand = demands
                .iter()
                .find(|(did, _)| *did == id)
                .map(|&(_, d)| d)
                .ok_or_else(|| format!("Missing demand for node {}", id))?;
            // File ids are 1-based; node 1 is the depot
            nodes.push(Node::new(id - 1, x, y, demand));
        }
        nodes.sort_by_key(|n| n.id);

        let cost_matrix = Self::compute_cost_matrix(&nodes, metric);

        Ok(CvrpInstance {
            name,
            comment,
            dimension,
            fleet: Fleet::new(vehicles, capacity),
            nodes,
            edge_weight_type,
            cost_matrix,
        })
    }

    fn compute_cost_matrix(nodes: &[Node], metric: Metric) -> Vec<Vec<f64>> {
        let n = nodes.len();
        let mut matrix = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    matrix[i][j] = metric(nodes[i].point, nodes[j].point);
                }
            }
        }

        matrix
    }

    /// Get the cost of the edge between two nodes
    #[inline]
    pub fn cost(&self, i: usize, j: usize) -> f64 {
        self.cost_matrix[i][j]
    }

    /// Get the demand of a node
    #[inline]
    pub fn demand(&self, i: usize) -> u32 {
        self.nodes[i].demand
    }

    /// Get the coordinates of a node
    #[inline]
    pub fn point(&self, i: usize) -> Point {
        self.nodes[i].point
    }

    /// Id of the depot node
    #[inline]
    pub fn depot(&self) -> usize {
        0
    }

    /// Vehicle capacity of the fleet
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.fleet.capacity
    }

    /// Number of vehicles in the fleet
    #[inline]
    pub fn vehicles(&self) -> usize {
        self.fleet.vehicles
    }

    /// Get the number of customer nodes (excluding depot)
    pub fn num_customers(&self) -> usize {
        self.dimension - 1
    }

    /// Iterator over customer node ids (depot excluded)
    pub fn customers(&self) -> impl Iterator<Item = usize> {
        1..self.dimension
    }

    /// Sum of all customer demands
    pub fn total_demand(&self) -> u32 {
        self.nodes.iter().map(|n| n.demand).sum()
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let customer_demands: Vec<u32> = self
            .nodes
            .iter()
            .filter(|n| !n.is_depot())
            .map(|n| n.demand)
            .collect();

        let mut distances: Vec<f64> = Vec::new();
        for i in 0..self.dimension {
            for j in i + 1..self.dimension {
                distances.push(self.cost(i, j));
            }
        }
        let avg_distance = distances.iter().sum::<f64>() / distances.len().max(1) as f64;
        let max_distance = distances.iter().cloned().fold(0.0, f64::max);

        InstanceStatistics {
            name: self.name.clone(),
            dimension: self.dimension,
            vehicles: self.fleet.vehicles,
            capacity: self.fleet.capacity,
            total_demand: customer_demands.iter().sum(),
            max_demand: customer_demands.iter().max().copied().unwrap_or(0),
            avg_distance,
            max_distance,
        }
    }
}

enum Section {
    Header,
    Coords,
    Demands,
    Depot,
    Other,
}

/// Extract the fleet size from a `... No of trucks: <K>, ...` comment.
fn parse_truck_count(comment: &str) -> Option<usize> {
    let pos = comment.find("No of trucks")?;
    let rest = &comment[pos + "No of trucks".len()..];
    let rest = rest.trim_start_matches([':', ' ']);
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Extract the fleet size from a `<name>-k<K>` instance name.
fn parse_trucks_from_name(name: &str) -> Option<usize> {
    let pos = name.rfind("-k")?;
    name[pos + 2..].parse().ok()
}

/// Statistics about a CVRP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub dimension: usize,
    pub vehicles: usize,
    pub capacity: u32,
    pub total_demand: u32,
    pub max_demand: u32,
    pub avg_distance: f64,
    pub max_distance: f64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(
            f,
            "  Nodes: {} (1 depot + {} customers)",
            self.dimension,
            self.dimension - 1
        )?;
        writeln!(f, "  Vehicles: {}", self.vehicles)?;
        writeln!(f, "  Capacity: {}", self.capacity)?;
        writeln!(f, "  Total demand: {}", self.total_demand)?;
        writeln!(f, "  Max demand: {}", self.max_demand)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
NAME : toy-n5-k2
COMMENT : (Augerat et al, No of trucks: 2, Optimal value: 8)
TYPE : CVRP
DIMENSION : 5
EDGE_WEIGHT_TYPE : EUC_2D
CAPACITY : 10
NODE_COORD_SECTION
 1 0 0
 2 1 0
 3 2 0
 4 0 1
 5 0 2
DEMAND_SECTION
 1 0
 2 6
 3 6
 4 6
 5 6
DEPOT_SECTION
 1
 -1
EOF
";

    #[test]
    fn test_euclidean_metric() {
        let d = euclidean(Point::new(0.0, 0.0), Point::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_parse_sample() {
        let instance = CvrpInstance::parse(SAMPLE.as_bytes()).unwrap();

        assert_eq!(instance.name, "toy-n5-k2");
        assert_eq!(instance.dimension, 5);
        assert_eq!(instance.vehicles(), 2);
        assert_eq!(instance.capacity(), 10);
        assert_eq!(instance.demand(0), 0);
        assert_eq!(instance.demand(1), 6);
        assert!((instance.cost(0, 2) - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_cost_matrix_is_symmetric() {
        let instance = CvrpInstance::parse(SAMPLE.as_bytes()).unwrap();

        for i in 0..instance.dimension {
            assert_eq!(instance.cost(i, i), 0.0);
            for j in 0..instance.dimension {
                assert_eq!(instance.cost(i, j), instance.cost(j, i));
            }
        }
    }

    #[test]
    fn test_unknown_edge_weight_type() {
        let data = SAMPLE.replace("EUC_2D", "GEO");
        let err = CvrpInstance::parse(data.as_bytes()).unwrap_err();
        assert!(err.contains("edge weight type"));
    }

    #[test]
    fn test_dimension_mismatch() {
        let data = SAMPLE.replace("DIMENSION : 5", "DIMENSION : 6");
        assert!(CvrpInstance::parse(data.as_bytes()).is_err());
    }

    #[test]
    fn test_truck_count_from_name() {
        let data = SAMPLE.replace("No of trucks: 2, ", "");
        let instance = CvrpInstance::parse(data.as_bytes()).unwrap();
        assert_eq!(instance.vehicles(), 2);
    }
}
