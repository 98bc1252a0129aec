//! Pixel-space rectangle clipping.
//!
//! Standalone points are kept or dropped. Lines are cut segment by segment,
//! producing one output line per run inside the rectangle. Polygon rings are
//! buffered and clipped as closed rings; a polygon whose rings all vanish
//! produces no output at all.

use foundation::Aabb2;

use crate::stream::GeoStream;

pub struct ClipRectStream<'a> {
    extent: Aabb2,
    sink: Box<dyn GeoStream + 'a>,
    in_polygon: bool,
    in_line: bool,
    line_open: bool,
    prev: Option<[f64; 2]>,
    ring: Vec<[f64; 2]>,
    rings: Vec<Vec<[f64; 2]>>,
}

impl<'a> ClipRectStream<'a> {
    pub fn new(extent: Aabb2, sink: Box<dyn GeoStream + 'a>) -> Self {
        Self {
            extent,
            sink,
            in_polygon: false,
            in_line: false,
            line_open: false,
            prev: None,
            ring: Vec::new(),
            rings: Vec::new(),
        }
    }

    fn line_point(&mut self, p: [f64; 2]) {
        match self.prev {
            None => {
                if self.extent.contains(p) {
                    self.sink.line_start();
                    self.sink.point(p[0], p[1]);
                    self.line_open = true;
                }
            }
            Some(a) => match clip_segment(&self.extent, a, p) {
                Some((t0, t1)) => {
                    if !self.line_open {
                        let c0 = lerp(a, p, t0);
                        self.sink.line_start();
                        self.sink.point(c0[0], c0[1]);
                        self.line_open = true;
                    }
                    let c1 = lerp(a, p, t1);
                    self.sink.point(c1[0], c1[1]);
                    if t1 < 1.0 {
                        self.sink.line_end();
                        self.line_open = false;
                    }
                }
                None => {
                    if self.line_open {
                        self.sink.line_end();
                        self.line_open = false;
                    }
                }
            },
        }
        self.prev = Some(p);
    }
}

impl GeoStream for ClipRectStream<'_> {
    fn point(&mut self, x: f64, y: f64) {
        let p = [x, y];
        if self.in_line {
            if self.in_polygon {
                self.ring.push(p);
            } else {
                self.line_point(p);
            }
        } else if self.extent.contains(p) {
            self.sink.point(x, y);
        }
    }

    fn line_start(&mut self) {
        self.in_line = true;
        self.prev = None;
        self.line_open = false;
        self.ring.clear();
    }

    fn line_end(&mut self) {
        if self.in_polygon {
            let ring = clip_ring(&self.extent, &self.ring);
            if !ring.is_empty() {
                self.rings.push(ring);
            }
            self.ring.clear();
        } else if self.line_open {
            self.sink.line_end();
        }
        self.in_line = false;
        self.line_open = false;
        self.prev = None;
    }

    fn polygon_start(&mut self) {
        self.in_polygon = true;
        self.rings.clear();
    }

    fn polygon_end(&mut self) {
        self.in_polygon = false;
        if self.rings.is_empty() {
            return;
        }
        self.sink.polygon_start();
        for ring in self.rings.drain(..) {
            self.sink.line_start();
            for p in ring {
                self.sink.point(p[0], p[1]);
            }
            self.sink.line_end();
        }
        self.sink.polygon_end();
    }

    fn sphere(&mut self) {
        self.sink.sphere()
    }
}

fn lerp(a: [f64; 2], b: [f64; 2], t: f64) -> [f64; 2] {
    if t == 0.0 {
        a
    } else if t == 1.0 {
        b
    } else {
        [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
    }
}

/// Liang–Barsky: the parameter range of segment `a -> b` inside `r`.
fn clip_segment(r: &Aabb2, a: [f64; 2], b: [f64; 2]) -> Option<(f64, f64)> {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    let checks = [
        (-dx, a[0] - r.min[0]),
        (dx, r.max[0] - a[0]),
        (-dy, a[1] - r.min[1]),
        (dy, r.max[1] - a[1]),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            if t > t1 {
                return None;
            }
            t0 = t0.max(t);
        } else {
            if t < t0 {
                return None;
            }
            t1 = t1.min(t);
        }
    }
    Some((t0, t1))
}

/// Sutherland–Hodgman against the four edges of `r`.
fn clip_ring(r: &Aabb2, ring: &[[f64; 2]]) -> Vec<[f64; 2]> {
    #[derive(Copy, Clone)]
    enum Edge {
        Left,
        Right,
        Top,
        Bottom,
    }

    let inside = |e: Edge, p: [f64; 2]| match e {
        Edge::Left => p[0] >= r.min[0],
        Edge::Right => p[0] <= r.max[0],
        Edge::Top => p[1] >= r.min[1],
        Edge::Bottom => p[1] <= r.max[1],
    };
    let cross = |e: Edge, a: [f64; 2], b: [f64; 2]| {
        let t = match e {
            Edge::Left => (r.min[0] - a[0]) / (b[0] - a[0]),
            Edge::Right => (r.max[0] - a[0]) / (b[0] - a[0]),
            Edge::Top => (r.min[1] - a[1]) / (b[1] - a[1]),
            Edge::Bottom => (r.max[1] - a[1]) / (b[1] - a[1]),
        };
        lerp(a, b, t)
    };

    let mut output: Vec<[f64; 2]> = ring.to_vec();
    for edge in [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom] {
        if output.is_empty() {
            break;
        }
        let input = std::mem::take(&mut output);
        let mut prev = input[input.len() - 1];
        for &cur in &input {
            let cur_in = inside(edge, cur);
            let prev_in = inside(edge, prev);
            if cur_in {
                if !prev_in {
                    output.push(cross(edge, prev, cur));
                }
                output.push(cur);
            } else if prev_in {
                output.push(cross(edge, prev, cur));
            }
            prev = cur;
        }
    }
    output
}
