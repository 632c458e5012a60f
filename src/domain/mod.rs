//! Domain Layer
//!
//! This is the core of Tether - peering business logic without provider coupling.
//!
//! ## Structure
//!
//! - `entities/` - Peers, edges, connections, routes
//! - `value_objects/` - Identifiers, marker tags, route scope
//! - `services/` - Registry validation, route planning, tag discovery
//! - `ports/` - Interface definitions for infrastructure
//!
//! ## Design Principles
//!
//! 1. **No provider SDKs** - All cloud access goes through `ports::NetworkApi`
//! 2. **Pure planning** - Route decisions are made by plain functions over observed state
//! 3. **Ports & Adapters** - Credentials and API calls are trait-defined

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
