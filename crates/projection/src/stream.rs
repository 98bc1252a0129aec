//! Push-style geometry stream protocol.
//!
//! Producers (GeoJSON walkers, projections) call these methods in document
//! order. Points outside a line are standalone points; a polygon is a
//! sequence of rings, each delimited by `line_start`/`line_end` inside
//! `polygon_start`/`polygon_end`. Rings do not repeat their closing vertex.

use std::cell::RefCell;
use std::rc::Rc;

use foundation::Aabb2;

pub trait GeoStream {
    fn point(&mut self, x: f64, y: f64);
    fn line_start(&mut self);
    fn line_end(&mut self);
    fn polygon_start(&mut self);
    fn polygon_end(&mut self);
    fn sphere(&mut self) {}
}

impl<S: GeoStream + ?Sized> GeoStream for &mut S {
    fn point(&mut self, x: f64, y: f64) {
        (**self).point(x, y)
    }
    fn line_start(&mut self) {
        (**self).line_start()
    }
    fn line_end(&mut self) {
        (**self).line_end()
    }
    fn polygon_start(&mut self) {
        (**self).polygon_start()
    }
    fn polygon_end(&mut self) {
        (**self).polygon_end()
    }
    fn sphere(&mut self) {
        (**self).sphere()
    }
}

impl<S: GeoStream + ?Sized> GeoStream for Box<S> {
    fn point(&mut self, x: f64, y: f64) {
        (**self).point(x, y)
    }
    fn line_start(&mut self) {
        (**self).line_start()
    }
    fn line_end(&mut self) {
        (**self).line_end()
    }
    fn polygon_start(&mut self) {
        (**self).polygon_start()
    }
    fn polygon_end(&mut self) {
        (**self).polygon_end()
    }
    fn sphere(&mut self) {
        (**self).sphere()
    }
}

/// One recorded stream call.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum StreamEvent {
    Point(f64, f64),
    LineStart,
    LineEnd,
    PolygonStart,
    PolygonEnd,
    Sphere,
}

/// Sink that remembers every call it receives, in order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordingStream {
    events: Vec<StreamEvent>,
}

impl RecordingStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[StreamEvent] {
        &self.events
    }

    pub fn points(&self) -> Vec<[f64; 2]> {
        self.events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Point(x, y) => Some([*x, *y]),
                _ => None,
            })
            .collect()
    }
}

impl GeoStream for RecordingStream {
    fn point(&mut self, x: f64, y: f64) {
        self.events.push(StreamEvent::Point(x, y));
    }
    fn line_start(&mut self) {
        self.events.push(StreamEvent::LineStart);
    }
    fn line_end(&mut self) {
        self.events.push(StreamEvent::LineEnd);
    }
    fn polygon_start(&mut self) {
        self.events.push(StreamEvent::PolygonStart);
    }
    fn polygon_end(&mut self) {
        self.events.push(StreamEvent::PolygonEnd);
    }
    fn sphere(&mut self) {
        self.events.push(StreamEvent::Sphere);
    }
}

/// Keeps the most recent point written to it.
///
/// Forward transforms read their result through a projection's stream with a
/// capture that lives only for the duration of one call, so no slot is shared
/// between calls.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct PointCapture {
    point: Option<[f64; 2]>,
}

impl PointCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<[f64; 2]> {
        self.point
    }

    pub fn take(&mut self) -> Option<[f64; 2]> {
        self.point.take()
    }
}

impl GeoStream for PointCapture {
    fn point(&mut self, x: f64, y: f64) {
        self.point = Some([x, y]);
    }
    fn line_start(&mut self) {}
    fn line_end(&mut self) {}
    fn polygon_start(&mut self) {}
    fn polygon_end(&mut self) {}
}

/// Accumulates the bounding rectangle of every point written to it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundsStream {
    bounds: Aabb2,
}

impl BoundsStream {
    pub fn new() -> Self {
        Self {
            bounds: Aabb2::empty(),
        }
    }

    /// `None` until at least one point has been seen.
    pub fn bounds(&self) -> Option<Aabb2> {
        (!self.bounds.is_empty()).then_some(self.bounds)
    }
}

impl Default for BoundsStream {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoStream for BoundsStream {
    fn point(&mut self, x: f64, y: f64) {
        if x.is_finite() && y.is_finite() {
            self.bounds.include([x, y]);
        }
    }
    fn line_start(&mut self) {}
    fn line_end(&mut self) {}
    fn polygon_start(&mut self) {}
    fn polygon_end(&mut self) {}
}

/// Cloneable handle over one sink, so several upstream stages can write to it.
///
/// Calls are strictly sequential: each forwarded call borrows the sink only
/// for its own duration.
pub struct SharedSink<'a> {
    inner: Rc<RefCell<Box<dyn GeoStream + 'a>>>,
}

impl<'a> SharedSink<'a> {
    pub fn new(sink: Box<dyn GeoStream + 'a>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(sink)),
        }
    }
}

impl Clone for SharedSink<'_> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl GeoStream for SharedSink<'_> {
    fn point(&mut self, x: f64, y: f64) {
        self.inner.borrow_mut().point(x, y)
    }
    fn line_start(&mut self) {
        self.inner.borrow_mut().line_start()
    }
    fn line_end(&mut self) {
        self.inner.borrow_mut().line_end()
    }
    fn polygon_start(&mut self) {
        self.inner.borrow_mut().polygon_start()
    }
    fn polygon_end(&mut self) {
        self.inner.borrow_mut().polygon_end()
    }
    fn sphere(&mut self) {
        self.inner.borrow_mut().sphere()
    }
}

/// Fan-out adapter: every event goes to every child, in order, unconditionally.
pub struct MultiplexStream<'a> {
    streams: Vec<Box<dyn GeoStream + 'a>>,
}

impl<'a> MultiplexStream<'a> {
    pub fn new(streams: Vec<Box<dyn GeoStream + 'a>>) -> Self {
        Self { streams }
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl GeoStream for MultiplexStream<'_> {
    fn point(&mut self, x: f64, y: f64) {
        for s in &mut self.streams {
            s.point(x, y);
        }
    }
    fn line_start(&mut self) {
        for s in &mut self.streams {
            s.line_start();
        }
    }
    fn line_end(&mut self) {
        for s in &mut self.streams {
            s.line_end();
        }
    }
    fn polygon_start(&mut self) {
        for s in &mut self.streams {
            s.polygon_start();
        }
    }
    fn polygon_end(&mut self) {
        for s in &mut self.streams {
            s.polygon_end();
        }
    }
    fn sphere(&mut self) {
        for s in &mut self.streams {
            s.sphere();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BoundsStream, GeoStream, MultiplexStream, PointCapture, RecordingStream, SharedSink,
        StreamEvent,
    };
    use pretty_assertions::assert_eq;

    /// Tags every point with a fixed x offset so children can be told apart.
    struct Offset<'a> {
        dx: f64,
        sink: Box<dyn GeoStream + 'a>,
    }

    impl GeoStream for Offset<'_> {
        fn point(&mut self, x: f64, y: f64) {
            self.sink.point(x + self.dx, y)
        }
        fn line_start(&mut self) {
            self.sink.line_start()
        }
        fn line_end(&mut self) {
            self.sink.line_end()
        }
        fn polygon_start(&mut self) {
            self.sink.polygon_start()
        }
        fn polygon_end(&mut self) {
            self.sink.polygon_end()
        }
        fn sphere(&mut self) {
            self.sink.sphere()
        }
    }

    #[test]
    fn multiplex_forwards_every_event_to_every_child_in_order() {
        let mut out = RecordingStream::new();
        {
            let shared = SharedSink::new(Box::new(&mut out));
            let mut mux = MultiplexStream::new(vec![
                Box::new(Offset {
                    dx: 0.0,
                    sink: Box::new(shared.clone()),
                }),
                Box::new(Offset {
                    dx: 100.0,
                    sink: Box::new(shared.clone()),
                }),
            ]);
            assert_eq!(mux.len(), 2);
            mux.polygon_start();
            mux.line_start();
            mux.point(1.0, 2.0);
            mux.line_end();
            mux.polygon_end();
            mux.sphere();
        }

        assert_eq!(
            out.events(),
            &[
                StreamEvent::PolygonStart,
                StreamEvent::PolygonStart,
                StreamEvent::LineStart,
                StreamEvent::LineStart,
                StreamEvent::Point(1.0, 2.0),
                StreamEvent::Point(101.0, 2.0),
                StreamEvent::LineEnd,
                StreamEvent::LineEnd,
                StreamEvent::PolygonEnd,
                StreamEvent::PolygonEnd,
                StreamEvent::Sphere,
                StreamEvent::Sphere,
            ]
        );
    }

    #[test]
    fn capture_keeps_last_point() {
        let mut capture = PointCapture::new();
        assert_eq!(capture.get(), None);
        capture.point(1.0, 2.0);
        capture.point(3.0, 4.0);
        assert_eq!(capture.take(), Some([3.0, 4.0]));
        assert_eq!(capture.get(), None);
    }

    #[test]
    fn bounds_stream_ignores_non_finite_points() {
        let mut b = BoundsStream::new();
        assert_eq!(b.bounds(), None);
        b.point(10.0, -5.0);
        b.point(f64::NAN, 1000.0);
        b.point(-2.0, 7.0);
        let r = b.bounds().expect("bounds");
        assert_eq!(r.to_corners(), [[-2.0, -5.0], [10.0, 7.0]]);
    }
}
