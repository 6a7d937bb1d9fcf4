// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.

// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

//! Format grammars built on the block engine.
//!
//! Each format module exposes the same thin surface: a `MAGIC` signature for
//! an external file-type sniffer, a `matches` helper, the format's
//! [`Grammar`](crate::parser::Grammar), and a `parse` entry point that
//! decodes a blob into a [`ParseTree`](crate::parser::ParseTree).

pub mod bes;
pub mod manm;
