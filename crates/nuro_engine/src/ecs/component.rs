//! Component marker trait

/// Marker trait for components
///
/// Components are plain data. They are not required to be `Send`: renderer
/// components share meshes and materials through `Rc`, and the registry is
/// only ever touched from the main thread.
pub trait Component: 'static {}
