use std::f64::consts::PI;

use geo_types::{coord, Coord};

/// Approximate an elliptical arc with `num_points` vertices, angles in
/// radians counter-clockwise from the X axis.
pub fn generate_arc(
    center: Coord,
    x_radius: f64,
    y_radius: f64,
    start_angle: f64,
    end_angle: f64,
    num_points: usize,
) -> Vec<Coord> {
    let num_points = num_points.max(2);
    let step = (end_angle - start_angle) / (num_points - 1) as f64;
    (0..num_points)
        .map(|i| {
            let angle = start_angle + step * i as f64;
            coord! {
                x: center.x + x_radius * angle.cos(),
                y: center.y + y_radius * angle.sin(),
            }
        })
        .collect()
}

/// Vertex count MapInfo uses for an arc: one vertex every two degrees.
pub fn arc_point_count(start_deg: f64, end_deg: f64) -> usize {
    let sweep = arc_sweep(start_deg, end_deg);
    ((sweep / 2.0).abs() as usize + 1).max(2)
}

/// Counter-clockwise sweep from `start_deg` to `end_deg`, in `(0, 360]`.
pub fn arc_sweep(start_deg: f64, end_deg: f64) -> f64 {
    let mut sweep = end_deg - start_deg;
    while sweep <= 0.0 {
        sweep += 360.0;
    }
    while sweep > 360.0 {
        sweep -= 360.0;
    }
    sweep
}

pub fn deg_to_rad(deg: f64) -> f64 {
    deg * PI / 180.0
}

/// Append the first vertex if the ring is not already closed.
pub fn close_ring(ring: &mut Vec<Coord>) {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if ring.len() > 1 && first != last {
            ring.push(first);
        }
    }
}

/// Decode Latin-1 bytes. Every byte maps to the code point of the same value.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode to Latin-1, replacing characters outside it with `?`.
pub fn string_to_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) < 256 { c as u8 } else { b'?' })
        .collect()
}

/// Cut a NUL padded fixed-width field at its first NUL.
pub fn trim_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_almost_eq;

    #[test]
    fn test_arc_endpoints() {
        let pts = generate_arc(coord! { x: 1.0, y: 1.0 }, 2.0, 1.0, 0.0, PI / 2.0, 46);
        assert_eq!(pts.len(), 46);
        assert_almost_eq(pts[0].x, 3.0);
        assert_almost_eq(pts[0].y, 1.0);
        assert_almost_eq(pts[45].x, 1.0);
        assert_almost_eq(pts[45].y, 2.0);
    }

    #[test]
    fn test_arc_point_count() {
        assert_eq!(arc_point_count(0.0, 90.0), 46);
        assert_eq!(arc_point_count(350.0, 10.0), 11);
        assert_eq!(arc_point_count(10.0, 10.0), 181);
    }

    #[test]
    fn test_close_ring() {
        let mut ring = vec![
            coord! { x: 0.0, y: 0.0 },
            coord! { x: 1.0, y: 0.0 },
            coord! { x: 1.0, y: 1.0 },
        ];
        close_ring(&mut ring);
        assert_eq!(ring.len(), 4);
        close_ring(&mut ring);
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn test_latin1() {
        let bytes = string_to_latin1("Québec €");
        assert_eq!(bytes, b"Qu\xe9bec ?");
        assert_eq!(latin1_to_string(b"Qu\xe9bec"), "Québec");
        assert_eq!(trim_nul(b"Arial\0\0"), b"Arial");
    }
}
