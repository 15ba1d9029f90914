//
// Copyright 2024, Niels Sascha Reedijk <niels.reedijk@gmail.com>
// All rights reserved. Distributed under the terms of the MIT License.
//

mod errors;

pub use self::errors::{ErrorKind, LooperError, Result};
