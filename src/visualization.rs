//! Plot export for CVRP solutions.
//!
//! Renders a solution by handing gnuplot a script drawing one coloured
//! polyline per route through the node coordinates, with circle
//! markers and id labels. The plotting process is spawned with the
//! script as its single argument and its exit status is not inspected;
//! plotting is best-effort.

use std::path::Path;
use std::process::Command;

use crate::instance::CvrpInstance;
use crate::solution::Solution;

const ROUTE_COLORS: [&str; 8] = [
    "red", "orange", "yellow", "green", "cyan", "blue", "violet", "magenta",
];

const LABEL_COLOR: &str = "black";

/// Gnuplot-based solution plotter
#[derive(Debug, Clone, Default)]
pub struct SolutionPlotter;

impl SolutionPlotter {
    pub fn new() -> Self {
        SolutionPlotter
    }

    /// Render the solution to the given file; the terminal type is
    /// taken from the file extension.
    pub fn export_plot<P: AsRef<Path>>(
        &self,
        instance: &CvrpInstance,
        solution: &Solution,
        path: P,
    ) -> Result<(), String> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| format!("Plot file {:?} has no extension", path))?;
        let terminal = if ext == "jpg" { "jpeg" } else { ext };

        let script = self.build_script(instance, solution, terminal, &path.to_string_lossy());
        log::debug!("Spawning gnuplot for {:?}", path);

        Command::new("bash")
            .arg("-c")
            .arg(&script)
            .spawn()
            .map_err(|e| format!("Failed to spawn plot process: {}", e))?;

        Ok(())
    }

    fn build_script(
        &self,
        instance: &CvrpInstance,
        solution: &Solution,
        terminal: &str,
        output: &str,
    ) -> String {
        let routes: Vec<&Vec<usize>> =
            solution.routes.iter().filter(|r| !r.is_empty()).collect();

        let title = format!("{} - cost {:.2}", instance.name, solution.cost);
        let mut plot = format!(
            "set terminal {}; set title \"{}\"; set key outside; set output \"{}\"; ",
            terminal, title, output
        );

        // Each route plots three times over the same data stream:
        // polyline, circle markers, id labels.
        for (idx, _) in routes.iter().enumerate() {
            let color = ROUTE_COLORS[idx % ROUTE_COLORS.len()];
            let lead = if idx == 0 { "plot" } else { "," };
            plot.push_str(&format!(
                "{} \"-\" using 1:2 with lines lc rgb \"{}\" lw 2 title \"Route {}\"",
                lead,
                color,
                idx + 1
            ));
            plot.push_str(&format!(
                ", \"\" using 1:2:(0.3) with circles fill solid lc rgb \"{}\" notitle",
                color
            ));
            plot.push_str(&format!(
                ", \"\" using 1:2:3 with labels tc rgb \"{}\" offset char 0,1 notitle",
                LABEL_COLOR
            ));
        }
        plot.push('\n');

        for route in &routes {
            let block = self.route_data(instance, route);
            for _ in 0..3 {
                plot.push_str(&block);
                plot.push_str("e\n");
            }
        }

        format!("gnuplot <<'PLOT'\n{}PLOT", plot)
    }

    /// Data block of one route: depot, stops, depot; `x y id` lines.
    fn route_data(&self, instance: &CvrpInstance, route: &[usize]) -> String {
        let depot = instance.point(instance.depot());
        let mut data = format!("{} {} {}\n", depot.x, depot.y, instance.depot());
        for &v in route {
            let p = instance.point(v);
            data.push_str(&format!("{} {} {}\n", p.x, p.y, v));
        }
        data.push_str(&format!("{} {} {}\n", depot.x, depot.y, instance.depot()));
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{metric_registry, CvrpInstance, Fleet, Node};

    #[test]
    fn test_script_contains_each_route() {
        let nodes = vec![
            Node::new(0, 0.0, 0.0, 0),
            Node::new(1, 1.0, 0.0, 1),
            Node::new(2, 0.0, 1.0, 1),
        ];
        let metric = *metric_registry().get("EUC_2D").unwrap();
        let instance = CvrpInstance::new("plot-test", nodes, Fleet::new(2, 10), metric);
        let solution = Solution::from_routes(&instance, vec![vec![1], vec![2]], "test");

        let script =
            SolutionPlotter::new().build_script(&instance, &solution, "png", "out.png");

        assert!(script.contains("set terminal png"));
        assert!(script.contains("Route 1"));
        assert!(script.contains("Route 2"));
        // Two routes, three data streams each
        assert_eq!(script.matches("\ne\n").count(), 6);
    }

    #[test]
    fn test_jpg_maps_to_jpeg_terminal() {
        let nodes = vec![Node::new(0, 0.0, 0.0, 0), Node::new(1, 1.0, 0.0, 1)];
        let metric = *metric_registry().get("EUC_2D").unwrap();
        let instance = CvrpInstance::new("plot-test", nodes, Fleet::new(1, 10), metric);
        let solution = Solution::from_routes(&instance, vec![vec![1]], "test");

        let script = SolutionPlotter::new().build_script(&instance, &solution, "jpeg", "x.jpg");
        assert!(script.contains("set terminal jpeg"));
    }
}
