//! Physical mouse clicks
//!
//! With `browser.human_mouse` set, clicks are delivered as real input events
//! along a curved path instead of through `element.click()`.

use std::time::Duration;

use rand::Rng;
use smallvec::SmallVec;
use tokio::time::sleep;

use crate::cdp::{MouseEventType, Session};
use crate::error::Result;

type Point = (f64, f64);

/// Stack-allocated storage for typical mouse paths
type Path = SmallVec<[Point; 64]>;

fn jitter(range: f64) -> f64 {
    rand::thread_rng().gen_range(-range..range)
}

fn between(min: f64, max: f64) -> f64 {
    rand::thread_rng().gen_range(min..max)
}

fn pause_ms(min: u64, max: u64) -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(min..max))
}

/// Number of intermediate points for a move of `distance` pixels
fn path_len(distance: f64) -> usize {
    (distance / 10.0).clamp(10.0, 50.0) as usize
}

/// Cubic Bezier from `start` to `end` with randomized control points
fn bezier_path(start: Point, end: Point, num_points: usize) -> Path {
    let num_points = num_points.max(2);
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);

    let cp1 = (
        start.0 + dx * between(0.2, 0.4) + jitter(50.0),
        start.1 + dy * between(0.0, 0.3) + jitter(50.0),
    );
    let cp2 = (
        start.0 + dx * between(0.6, 0.8) + jitter(50.0),
        start.1 + dy * between(0.7, 1.0) + jitter(50.0),
    );

    (0..num_points)
        .map(|i| {
            let t = i as f64 / (num_points - 1) as f64;
            let mt = 1.0 - t;
            let a = mt * mt * mt;
            let b = 3.0 * mt * mt * t;
            let c = 3.0 * mt * t * t;
            let d = t * t * t;
            (
                a * start.0 + b * cp1.0 + c * cp2.0 + d * end.0,
                a * start.1 + b * cp1.1 + c * cp2.1 + d * end.1,
            )
        })
        .collect()
}

/// Move from `from` to `target` along a curve and click there.
///
/// Returns the point actually clicked.
pub async fn move_and_click(session: &Session, from: Point, target: Point) -> Result<Point> {
    let distance = ((target.0 - from.0).powi(2) + (target.1 - from.1).powi(2)).sqrt();

    for (x, y) in bezier_path(from, target, path_len(distance)) {
        session
            .dispatch_mouse_event(MouseEventType::MouseMoved, x, y, false)
            .await?;
        sleep(pause_ms(5, 25)).await;
    }
    sleep(pause_ms(50, 150)).await;

    let (x, y) = (target.0 + jitter(2.0), target.1 + jitter(2.0));
    session
        .dispatch_mouse_event(MouseEventType::MousePressed, x, y, true)
        .await?;
    sleep(pause_ms(50, 120)).await;
    session
        .dispatch_mouse_event(MouseEventType::MouseReleased, x, y, true)
        .await?;

    Ok((x, y))
}
