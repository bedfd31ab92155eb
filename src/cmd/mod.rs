/*!
Command side of the CLI: from the words a user typed to a rendered result.

Layout:
  src/cmd/
    mod.rs       (this file)
    table.rs     command table: canonical names -> handler | passthrough endpoint
    params.rs    parameter notation + typed body building
    suggest.rs   edit-distance "did you mean" over table names
    dispatch.rs  Resolving -> Mapping -> Executing -> Done
    batch.rs     compound commands (sell-all) with pacing
    output.rs    human / JSON rendering
    exec.rs      argument splitting, param files, runtime, exit codes

Conventions:
  - Nothing below `exec.rs` prints; rendering returns strings.
  - Argument and lookup failures never touch the network.
*/

pub mod batch;
pub mod dispatch;
pub mod exec;
pub mod output;
pub mod params;
pub mod suggest;
pub mod table;

pub use exec::{RunOptions, run};
