//! Scene mutations produced by tools and applied by the session.
//!
//! Tools never touch the scene directly: they describe what should change
//! and the session applies it here, turning each change into a
//! [`SceneEvent`] that feeds the undo history.

use annot_core::id::ObjectId;
use annot_core::model::{ObjectKind, Scene, SceneObject};
use kurbo::{Point, Rect};

#[derive(Debug, Clone, PartialEq)]
pub enum SceneMutation {
    /// Push a new object on top of the stack.
    Add { object: Box<SceneObject> },
    /// Push a finished freehand stroke.
    CompleteStroke { object: Box<SceneObject> },
    Remove { id: ObjectId },
    Move { id: ObjectId, dx: f64, dy: f64 },
    /// Fit an object to new scene-space bounds (resize handle drag).
    SetBounds { id: ObjectId, bounds: Rect },
    /// Replace the geometry of an in-progress shape.
    Reshape {
        id: ObjectId,
        origin: Point,
        kind: ObjectKind,
    },
    /// Make an in-progress shape selectable and evented.
    Finalize { id: ObjectId },
}

/// Structural change notifications consumed by the history manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    Added(ObjectId),
    Removed(ObjectId),
    Modified(ObjectId),
    StrokeCompleted(ObjectId),
}

impl SceneEvent {
    pub fn id(&self) -> ObjectId {
        match *self {
            SceneEvent::Added(id)
            | SceneEvent::Removed(id)
            | SceneEvent::Modified(id)
            | SceneEvent::StrokeCompleted(id) => id,
        }
    }
}

/// Apply one mutation. Returns `None` when the target no longer exists.
pub fn apply_mutation(scene: &mut Scene, mutation: SceneMutation) -> Option<SceneEvent> {
    match mutation {
        SceneMutation::Add { object } => Some(SceneEvent::Added(scene.add(*object))),
        SceneMutation::CompleteStroke { object } => {
            Some(SceneEvent::StrokeCompleted(scene.add(*object)))
        }
        SceneMutation::Remove { id } => scene.remove(id).map(|_| SceneEvent::Removed(id)),
        SceneMutation::Move { id, dx, dy } => {
            let obj = scene.get_mut(id)?;
            obj.translate(dx, dy);
            Some(SceneEvent::Modified(id))
        }
        SceneMutation::SetBounds { id, bounds } => {
            let obj = scene.get_mut(id)?;
            obj.set_bounds(bounds);
            Some(SceneEvent::Modified(id))
        }
        SceneMutation::Reshape { id, origin, kind } => {
            let obj = scene.get_mut(id)?;
            obj.kind = kind;
            obj.transform.left = origin.x;
            obj.transform.top = origin.y;
            Some(SceneEvent::Modified(id))
        }
        SceneMutation::Finalize { id } => {
            let obj = scene.get_mut(id)?;
            obj.set_interactive(true);
            Some(SceneEvent::Modified(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn square(name: &str) -> SceneObject {
        SceneObject::new(
            ObjectId::intern(name),
            ObjectKind::Rect {
                width: 10.0,
                height: 10.0,
            },
        )
    }

    #[test]
    fn add_move_remove() {
        let mut scene = Scene::new();
        let id = ObjectId::intern("mut_sq");
        assert_eq!(
            apply_mutation(
                &mut scene,
                SceneMutation::Add {
                    object: Box::new(square("mut_sq"))
                }
            ),
            Some(SceneEvent::Added(id))
        );
        apply_mutation(
            &mut scene,
            SceneMutation::Move {
                id,
                dx: 5.0,
                dy: -2.0,
            },
        );
        assert_eq!(scene.get(id).unwrap().transform.origin(), Point::new(5.0, -2.0));
        assert_eq!(
            apply_mutation(&mut scene, SceneMutation::Remove { id }),
            Some(SceneEvent::Removed(id))
        );
        assert_eq!(apply_mutation(&mut scene, SceneMutation::Remove { id }), None);
    }

    #[test]
    fn reshape_then_finalize() {
        let mut scene = Scene::new();
        let mut placeholder = square("mut_shape");
        placeholder.set_interactive(false);
        let id = scene.add(placeholder);

        apply_mutation(
            &mut scene,
            SceneMutation::Reshape {
                id,
                origin: Point::new(3.0, 4.0),
                kind: ObjectKind::Circle { radius: 7.0 },
            },
        );
        apply_mutation(&mut scene, SceneMutation::Finalize { id });
        let obj = scene.get(id).unwrap();
        assert_eq!(obj.kind, ObjectKind::Circle { radius: 7.0 });
        assert_eq!(obj.bounding_rect(), Rect::new(3.0, 4.0, 17.0, 18.0));
        assert!(obj.selectable && obj.evented);
    }
}
