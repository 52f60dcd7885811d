//! Composition combinators for dependent and independent async steps.
//!
//! Two shapes cover every pipeline in this service: [`chain`] for steps
//! where the next depends on the previous value, and [`join2`]/[`join3`]
//! for independent steps whose results are combined. The first failure
//! short-circuits either shape.

use std::future::Future;

use futures::future::{try_join, try_join3};

/// Run `first`; on success feed its value to `next` and run the step it
/// returns. A failure at either stage propagates without running anything
/// after it.
pub async fn chain<A, B, E, FirstFut, Next, NextFut>(first: FirstFut, next: Next) -> Result<B, E>
where
    FirstFut: Future<Output = Result<A, E>>,
    Next: FnOnce(A) -> NextFut,
    NextFut: Future<Output = Result<B, E>>,
{
    let value = first.await?;
    next(value).await
}

/// Run two independent steps concurrently; combine their values once both
/// succeed. The first failure wins and the other branch is not awaited
/// further.
pub async fn join2<A, B, C, E, FutA, FutB>(
    a: FutA,
    b: FutB,
    combine: impl FnOnce(A, B) -> C,
) -> Result<C, E>
where
    FutA: Future<Output = Result<A, E>>,
    FutB: Future<Output = Result<B, E>>,
{
    let (a, b) = try_join(a, b).await?;
    Ok(combine(a, b))
}

/// Three-way variant of [`join2`], the shape used to gather independent
/// authorization checks before building a token.
pub async fn join3<A, B, C, D, E, FutA, FutB, FutC>(
    a: FutA,
    b: FutB,
    c: FutC,
    combine: impl FnOnce(A, B, C) -> D,
) -> Result<D, E>
where
    FutA: Future<Output = Result<A, E>>,
    FutB: Future<Output = Result<B, E>>,
    FutC: Future<Output = Result<C, E>>,
{
    let (a, b, c) = try_join3(a, b, c).await?;
    Ok(combine(a, b, c))
}
