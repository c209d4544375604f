// ABOUTME: Compile-fail test verifying ObjectVersionId and ImageId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use catapult::types::{ImageId, ObjectVersionId};

fn takes_version_id(_id: ObjectVersionId) {}

fn main() {
    let image = ImageId::new("sha256:abc");
    takes_version_id(image); // ERROR: expected ObjectVersionId, found ImageId
}
