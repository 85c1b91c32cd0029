//! Canvas engine for the collaborative whiteboard.
//!
//! This crate is compiled to WebAssembly and runs in the browser. It owns the
//! full client side of a board: the element model and its geometry, the
//! interaction state machine that turns pointer and keyboard input into
//! element mutations, undo history, remote presence, the room session that
//! speaks the [`protocol`] wire format, and the Canvas2D renderer. The host
//! JavaScript layer wires DOM events and the WebSocket to [`engine::Engine`]
//! and forwards the encoded messages it returns.
//!
//! Everything except [`render`] and the [`engine::Engine`] wrapper is plain
//! Rust and tested natively.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`engine`] | Top-level engine and testable [`engine::EngineCore`] |
//! | [`input`] | Tools, input event types and the gesture state machine |
//! | [`element`] | Element kinds, styles, handles and JSON patches |
//! | [`geometry`] | Points, rectangles, curves and path simplification |
//! | [`bounds`] | Local and rotated element boxes |
//! | [`hit`] | Handles and hit-testing |
//! | [`transform`] | Move, resize, rotate and curve-bend math |
//! | [`wire`] | Wire endpoint derivation and path resolution |
//! | [`router`] | A* orthogonal wire routing |
//! | [`doc`] | In-memory document store with wire cascade |
//! | [`history`] | Snapshot undo/redo |
//! | [`collab`] | Remote cursors, strokes, highlights and throttles |
//! | [`session`] | Room membership and outbound message shaping |
//! | [`export`] | JSON export and import |
//! | [`camera`] | Pan/zoom camera and coordinate conversions |
//! | [`text`] | Text measurement |
//! | [`render`] | Canvas2D scene rendering |
//! | [`consts`] | Shared numeric constants (thresholds, throttles, defaults) |

pub mod bounds;
pub mod camera;
pub mod collab;
pub mod consts;
pub mod doc;
pub mod element;
pub mod engine;
pub mod export;
pub mod geometry;
pub mod hit;
pub mod history;
pub mod input;
pub mod render;
pub mod router;
pub mod session;
pub mod text;
pub mod transform;
pub mod wire;
