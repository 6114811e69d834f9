//! Validation helpers for DTOs.

use std::collections::HashSet;

use validator::ValidationError;

use crate::dto::game_state::ValidatedItem;

/// Validates that every validation key points inside the grid and appears only once.
///
/// # Examples
///
/// ```ignore
/// validate_validated_indices(&grid_of_6, &[(5, item)]) // Ok
/// validate_validated_indices(&grid_of_6, &[(6, item)]) // Err - outside the grid
/// validate_validated_indices(&grid_of_6, &[(2, a), (2, b)]) // Err - duplicate key
/// ```
pub fn validate_validated_indices(
    grid: &[String],
    validated_items: &[(usize, ValidatedItem)],
) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for (index, _) in validated_items {
        if *index >= grid.len() {
            let mut err = ValidationError::new("validated_index_range");
            err.message = Some(
                format!(
                    "Validated index {index} is outside a grid of {} cells",
                    grid.len()
                )
                .into(),
            );
            return Err(err);
        }

        if !seen.insert(*index) {
            let mut err = ValidationError::new("validated_index_duplicate");
            err.message = Some(format!("Validated index {index} appears more than once").into());
            return Err(err);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> ValidatedItem {
        ValidatedItem {
            proposition_id: "p1".into(),
            description: "ok".into(),
            timestamp: 1,
        }
    }

    fn grid(len: usize) -> Vec<String> {
        (0..len).map(|i| format!("p{i}")).collect()
    }

    #[test]
    fn test_validate_indices_valid() {
        assert!(validate_validated_indices(&grid(6), &[]).is_ok());
        assert!(validate_validated_indices(&grid(6), &[(0, item()), (5, item())]).is_ok());
    }

    #[test]
    fn test_validate_indices_out_of_range() {
        assert!(validate_validated_indices(&grid(6), &[(6, item())]).is_err());
        assert!(validate_validated_indices(&[], &[(0, item())]).is_err());
    }

    #[test]
    fn test_validate_indices_duplicate() {
        assert!(validate_validated_indices(&grid(6), &[(2, item()), (2, item())]).is_err());
    }
}
