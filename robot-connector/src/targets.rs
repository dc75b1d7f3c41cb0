use field_protocol::{GameSnapshot, TeamTag};
use navigator::{Point, Waypoints};

/// Inner corners of both baskets: own bottom-right and top-right, then the
/// opponent's top-left and bottom-left.
pub fn basket_targets(
    snapshot: &GameSnapshot,
    robot_id: u32,
) -> Result<Waypoints, Box<dyn std::error::Error>> {
    let team = snapshot
        .team_of(robot_id)
        .ok_or_else(|| format!("robot {robot_id} is not playing in this match"))?;
    let baskets = &snapshot
        .field
        .as_ref()
        .ok_or("game state has no field description")?
        .baskets;

    let basket = |tag: TeamTag| {
        baskets
            .of(tag)
            .ok_or_else(|| format!("game state has no basket for {}", tag.as_str()))
    };
    let own = basket(team)?;
    let opponent = basket(team.opponent())?;

    let points = vec![
        Point::from(own.bottom_right),
        Point::from(own.top_right),
        Point::from(opponent.top_left),
        Point::from(opponent.bottom_left),
    ];
    Ok(Waypoints::new(points)?)
}

/// Configured waypoints win; otherwise they come from the baskets.
pub fn resolve(
    configured: Option<&[Point]>,
    snapshot: &GameSnapshot,
    robot_id: u32,
) -> Result<Waypoints, Box<dyn std::error::Error>> {
    match configured {
        Some(points) => Ok(Waypoints::new(points.to_vec())?),
        None => basket_targets(snapshot, robot_id),
    }
}
