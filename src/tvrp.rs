//! Technician-VRP data model.
//!
//! The TVRP refines the CVRP: the fleet becomes a set of technicians
//! with boolean skill masks, every node carries a required-skill mask,
//! and a technician may only visit nodes whose required skills it
//! holds. Instance files (`.tvrp`) extend the CVRP format with a
//! `SKILL_SECTION` and a `TECHNICIAN_SECTION`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::instance::CvrpInstance;

/// Technician-by-skill boolean matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicianData {
    skills: Vec<Vec<bool>>,
}

impl TechnicianData {
    /// Build from a rectangular matrix; rows are technicians.
    pub fn new(skills: Vec<Vec<bool>>) -> Result<Self, String> {
        let width = skills.first().map_or(0, |row| row.len());
        if skills.iter().any(|row| row.len() != width) {
            return Err("Technician skill matrix is not rectangular".to_string());
        }
        Ok(TechnicianData { skills })
    }

    pub fn num_technicians(&self) -> usize {
        self.skills.len()
    }

    pub fn num_skills(&self) -> usize {
        self.skills.first().map_or(0, |row| row.len())
    }

    #[inline]
    pub fn has_skill(&self, technician: usize, skill: usize) -> bool {
        self.skills[technician][skill]
    }
}

/// A CVRP instance refined with technician and skill data.
///
/// The vehicle count of the underlying fleet equals the number of
/// technicians.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvrpInstance {
    base: CvrpInstance,
    technicians: TechnicianData,
    /// Required-skill mask per node; the depot requires nothing
    required: Vec<Vec<bool>>,
}

impl TvrpInstance {
    pub fn new(
        mut base: CvrpInstance,
        technicians: TechnicianData,
        required: Vec<Vec<bool>>,
    ) -> Result<Self, String> {
        if required.len() != base.dimension {
            return Err(format!(
                "Expected {} skill rows, found {}",
                base.dimension,
                required.len()
            ));
        }
        if required
            .iter()
            .any(|row| row.len() != technicians.num_skills())
        {
            return Err("Node skill rows do not match the technician skill count".to_string());
        }

        base.fleet.vehicles = technicians.num_technicians();
        Ok(TvrpInstance {
            base,
            technicians,
            required,
        })
    }

    /// Parse a TVRP instance file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let data = fs::read_to_string(&path).map_err(|e| format!("Cannot open file: {}", e))?;
        Self::parse(&data)
    }

    /// Parse the TVRP format: the CVRP sections plus the two skill
    /// matrices.
    pub fn parse(data: &str) -> Result<Self, String> {
        let base = CvrpInstance::parse(data.as_bytes())?;

        let mut skill_rows: Vec<(usize, Vec<bool>)> = Vec::new();
        let mut technician_rows: Vec<Vec<bool>> = Vec::new();

        let mut section = "";
        for line in data.lines() {
            let line = line.trim();
            if line.is_empty() || line == "EOF" {
                continue;
            }
            if line.ends_with("_SECTION") {
                section = if line.starts_with("SKILL_SECTION") {
                    "skills"
                } else if line.starts_with("TECHNICIAN_SECTION") {
                    "technicians"
                } else {
                    ""
                };
                continue;
            }

            match section {
                "skills" => {
                    let (id, bits) = parse_mask_row(line)?;
                    skill_rows.push((id, bits));
                }
                "technicians" => {
                    let (_, bits) = parse_mask_row(line)?;
                    technician_rows.push(bits);
                }
                _ => {}
            }
        }

        if skill_rows.len() != base.dimension {
            return Err(format!(
                "Expected {} SKILL_SECTION rows, found {}",
                base.dimension,
                skill_rows.len()
            ));
        }
        if technician_rows.is_empty() {
            return Err("Missing TECHNICIAN_SECTION".to_string());
        }

        // File ids are 1-based
        let mut required = vec![Vec::new(); base.dimension];
        for (id, bits) in skill_rows {
            if id == 0 || id > base.dimension {
                return Err(format!("Skill row id out of range: {}", id));
            }
            required[id - 1] = bits;
        }

        let technicians = TechnicianData::new(technician_rows)?;
        Self::new(base, technicians, required)
    }

    /// The underlying CVRP instance.
    #[inline]
    pub fn cvrp(&self) -> &CvrpInstance {
        &self.base
    }

    pub fn num_technicians(&self) -> usize {
        self.technicians.num_technicians()
    }

    /// Required-skill mask of a node.
    pub fn required_skills(&self, node: usize) -> &[bool] {
        &self.required[node]
    }

    /// A technician can serve a node iff it holds every skill the node
    /// requires.
    pub fn can_serve(&self, technician: usize, node: usize) -> bool {
        self.required[node]
            .iter()
            .enumerate()
            .all(|(skill, &needed)| !needed || self.technicians.has_skill(technician, skill))
    }
}

/// Parse a `<id> <bit>...` matrix row.
fn parse_mask_row(line: &str) -> Result<(usize, Vec<bool>), String> {
    let mut tokens = line.split_whitespace();
    let id: usize = tokens
        .next()
        .ok_or_else(|| "Empty matrix row".to_string())?
        .parse()
        .map_err(|_| format!("Invalid row id in: {}", line))?;

    let mut bits = Vec::new();
    for token in tokens {
        match token {
            "0" => bits.push(false),
            "1" => bits.push(true),
            _ => return Err(format!("Invalid skill bit: {}", token)),
        }
    }

    Ok((id, bits))
}
